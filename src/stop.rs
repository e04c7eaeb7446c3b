//! 协作式停止标志.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 停止令牌
///
/// 克隆体共享同一个标志. 泵循环每次迭代检查一次, 不会打断进行中的 `convert`.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求停止
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 底层标志, 供 signal-hook 直接注册
    pub fn as_flag(&self) -> &Arc<AtomicBool> {
        &self.flag
    }
}
