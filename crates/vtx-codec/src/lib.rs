//! # vtx-codec
//!
//! vtx 编解码器框架: 按格式分发的注册表, 统一的 [`Codec`] 契约, 以及各编码后端.
//!
//! ## 内置后端
//!
//! - **解码表**: MJPG / JPEG → 原始格式
//! - **编码表**: JPEG / MJPG, H.264 (帧内 PCM), 通配项直通/重排
//! - **引擎注入**: VP8/VP9, H.264/H.265 编码库, GPU / IL 硬件编码
//!
//! ## 使用示例
//!
//! ```rust
//! use vtx_codec::{CodecDescriptor, CodecRegistry};
//! use vtx_core::FourCc;
//!
//! let mut reg = CodecRegistry::new();
//! vtx_codec::register_all(&mut reg);
//!
//! let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::MJPG, 640, 480);
//! let codec = reg.create(&desc, 0).unwrap();
//! assert_eq!(codec.name(), "jpeg");
//! ```

pub mod codec;
pub mod decoders;
pub mod descriptor;
pub mod encoders;
pub mod nal;
pub mod parsers;
pub mod registry;

// 重导出常用类型
pub use codec::{BackendKind, Codec, ConvertOutcome, write_packet};
pub use descriptor::{CodecDescriptor, CodecOptions};
pub use encoders::{register_hw, register_nal, register_vpx};
pub use nal::NalAggregator;
pub use registry::{CodecFactory, CodecRegistry};

/// 注册所有内置编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
    encoders::register_all_encoders(registry);
}
