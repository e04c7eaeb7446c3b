//! # vtx
//!
//! V4L2 视频压缩泵: 从采集设备读帧, 按格式分发给编解码器, 写入输出设备.
//!
//! # 快速开始
//!
//! ```rust
//! use vtx::core::{FourCc, MemorySink, MemorySource};
//! use vtx::{Pump, PumpConfig, StopToken};
//!
//! let registry = vtx::default_codec_registry();
//!
//! let mut source = MemorySource::new(FourCc::GREY, 16, 16, 256);
//! source.push_frame(vec![128u8; 256]);
//! let sink = MemorySink::new(FourCc::MJPG, 16, 16, 0);
//!
//! let pump = Pump::new(&registry, source, sink.clone(), &PumpConfig::new(FourCc::MJPG)).unwrap();
//! let report = pump.run(&StopToken::new());
//! assert_eq!(report.stats.frames, 1);
//! assert_eq!(sink.packets().len(), 1);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `vtx-core` | 错误类型, FourCC, 像素布局, 采集/输出 trait |
//! | `vtx-scale` | 像素格式与 I420 互转 |
//! | `vtx-codec` | 编解码器注册表与各后端 |
//! | `vtx-device` | V4L2 采集端与输出端 |

pub mod pump;
pub mod stop;

/// 核心类型与工具
pub use vtx_core as core;

/// 编解码器框架
pub use vtx_codec as codec;

/// 像素格式转换
pub use vtx_scale as scale;

/// V4L2 设备层
pub use vtx_device as device;

pub use pump::{Pump, PumpConfig, PumpReport, PumpState, PumpStats, StopReason};
pub use stop::StopToken;

/// 获取 vtx 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置编解码器的注册表
pub fn default_codec_registry() -> vtx_codec::CodecRegistry {
    let mut registry = vtx_codec::CodecRegistry::new();
    vtx_codec::register_all(&mut registry);
    registry
}
