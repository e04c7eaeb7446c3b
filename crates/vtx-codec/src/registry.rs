//! 编解码器注册表.
//!
//! 两张独立的表:
//! - 解码表: 以采集格式为键, 用于压缩输入 (如 MJPEG) 解码为原始格式;
//! - 编码表: 以输出格式为键, 用于原始帧编码或重排.
//!
//! 编码表中的 [`FourCc::ANY`] 为通配项, 无精确匹配时使用.
//! 注册表在启动时由 [`crate::register_all`] 填充一次, 之后只读, 可跨线程共享引用.

use std::collections::HashMap;

use log::debug;
use vtx_core::{FourCc, VtxError, VtxResult};

use crate::codec::Codec;
use crate::descriptor::CodecDescriptor;

/// 编解码器工厂函数类型: (描述符, 日志详细级别) → 实例
pub type CodecFactory = fn(&CodecDescriptor, u8) -> VtxResult<Box<dyn Codec>>;

/// 注册条目
struct CodecEntry {
    /// 后端名称
    name: String,
    /// 工厂函数
    factory: CodecFactory,
}

/// 编解码器注册表
pub struct CodecRegistry {
    /// 解码器工厂映射 (按输入格式)
    decoders: HashMap<FourCc, CodecEntry>,
    /// 编码器工厂映射 (按输出格式)
    encoders: HashMap<FourCc, CodecEntry>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
            encoders: HashMap::new(),
        }
    }

    /// 注册一个解码器, 同一键重复注册时后者覆盖前者
    pub fn register_decoder(
        &mut self,
        input_format: FourCc,
        name: impl Into<String>,
        factory: CodecFactory,
    ) {
        self.decoders.insert(
            input_format,
            CodecEntry {
                name: name.into(),
                factory,
            },
        );
    }

    /// 注册一个编码器, 同一键重复注册时后者覆盖前者
    pub fn register_encoder(
        &mut self,
        output_format: FourCc,
        name: impl Into<String>,
        factory: CodecFactory,
    ) {
        self.encoders.insert(
            output_format,
            CodecEntry {
                name: name.into(),
                factory,
            },
        );
    }

    /// 查找描述符将命中的条目: 先解码表 (按输入格式), 再编码表 (按输出格式), 最后通配项
    fn resolve(&self, desc: &CodecDescriptor) -> Option<&CodecEntry> {
        self.decoders
            .get(&desc.input_format)
            .or_else(|| self.encoders.get(&desc.output_format))
            .or_else(|| self.encoders.get(&FourCc::ANY))
    }

    /// 返回描述符将使用的后端名称, 不构造实例
    pub fn resolve_name(&self, desc: &CodecDescriptor) -> Option<&str> {
        self.resolve(desc).map(|e| e.name.as_str())
    }

    /// 按描述符创建编解码器实例
    ///
    /// 无任何匹配 (包括通配项) 时返回 `CodecNotFound`;
    /// 工厂函数的错误原样传出, 不重试也不换用其他后端.
    pub fn create(&self, desc: &CodecDescriptor, verbose: u8) -> VtxResult<Box<dyn Codec>> {
        let entry = self.resolve(desc).ok_or_else(|| {
            VtxError::CodecNotFound(format!(
                "{} → {} 没有可用的编解码器",
                desc.input_format, desc.output_format
            ))
        })?;
        debug!(
            "创建编解码器 {}: {} → {}, {}x{}",
            entry.name, desc.input_format, desc.output_format, desc.width, desc.height
        );
        (entry.factory)(desc, verbose)
    }

    /// 编码表中所有格式 (顺序无意义, 仅用于能力展示)
    pub fn supported_formats(&self) -> Vec<FourCc> {
        self.encoders.keys().copied().collect()
    }

    /// 获取所有已注册的解码器
    pub fn list_decoders(&self) -> Vec<(FourCc, &str)> {
        self.decoders
            .iter()
            .map(|(f, e)| (*f, e.name.as_str()))
            .collect()
    }

    /// 获取所有已注册的编码器
    pub fn list_encoders(&self) -> Vec<(FourCc, &str)> {
        self.encoders
            .iter()
            .map(|(f, e)| (*f, e.name.as_str()))
            .collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
