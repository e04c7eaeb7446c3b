//! 编码器实现模块.
//!
//! 内置后端 (直通, JPEG, H.264 帧内 PCM) 由 [`register_all_encoders`] 注册.
//! 依赖外部编码库的后端 (VPx, H.264/H.265 库, GPU/IL) 只提供后端框架,
//! 宿主程序实现对应引擎 trait 后用 `register_*` 系列函数注入.

pub mod h264_pcm;
pub mod h26x;
pub mod hardware;
pub mod jpeg;
pub mod passthrough;
pub mod vpx;

use vtx_core::FourCc;

use crate::registry::CodecRegistry;

use self::h26x::{NalBackend, NalEngine};
use self::hardware::{HwBackend, HwEngine};
use self::vpx::{VpxBackend, VpxEngine};

/// 注册所有内置编码器
pub fn register_all_encoders(registry: &mut CodecRegistry) {
    registry.register_encoder(FourCc::ANY, "passthrough", passthrough::Passthrough::create);
    registry.register_encoder(FourCc::JPEG, "jpeg", jpeg::JpegEncoder::create);
    registry.register_encoder(FourCc::MJPG, "mjpeg", jpeg::JpegEncoder::create);
    registry.register_encoder(
        FourCc::H264,
        "h264-pcm",
        NalBackend::<h264_pcm::IntraPcmEngine>::create,
    );
}

/// 以 VP80 与 VP90 为键注册一个 VPx 引擎
pub fn register_vpx<E: VpxEngine + 'static>(registry: &mut CodecRegistry, name: &str) {
    registry.register_encoder(FourCc::VP80, name, VpxBackend::<E>::create);
    registry.register_encoder(FourCc::VP90, name, VpxBackend::<E>::create);
}

/// 以 `format` (H264 或 HEVC) 为键注册一个 NAL 引擎, 覆盖同键的内置引擎
pub fn register_nal<E: NalEngine + 'static>(
    registry: &mut CodecRegistry,
    format: FourCc,
    name: &str,
) {
    registry.register_encoder(format, name, NalBackend::<E>::create);
}

/// 以 `format` (H264 或 HEVC) 为键注册一个硬件引擎
pub fn register_hw<E: HwEngine + 'static>(
    registry: &mut CodecRegistry,
    format: FourCc,
    name: &str,
) {
    registry.register_encoder(format, name, HwBackend::<E>::create);
}
