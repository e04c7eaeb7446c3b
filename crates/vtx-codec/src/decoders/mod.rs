//! 解码器实现模块.
//!
//! 解码表以采集格式为键: 采集端输出压缩流时, 先解码为原始格式再写出.

pub mod jpeg;

use vtx_core::FourCc;

use crate::registry::CodecRegistry;

/// 注册所有内置解码器
pub fn register_all_decoders(registry: &mut CodecRegistry) {
    registry.register_decoder(FourCc::MJPG, "mjpeg", jpeg::JpegDecoder::create);
    registry.register_decoder(FourCc::JPEG, "jpeg", jpeg::JpegDecoder::create);
}
