//! JPEG 静态图像编码器.
//!
//! 每帧编码为一张完整的 JFIF 图像, 写出一个数据包 (即 MJPEG 流).
//! 色度采样 4:2:0, 质量与重启间隔来自选项 `QUALITY` / `DRI`.

use jpeg_encoder::{ColorType, Encoder, SamplingFactor};
use log::{debug, info, warn};
use vtx_core::{FourCc, FrameSink, VtxError, VtxResult};
use vtx_scale::{I420Image, to_i420};

use crate::codec::{BackendKind, Codec, ConvertOutcome, write_packet};
use crate::descriptor::{CodecDescriptor, OPT_DRI, OPT_QUALITY};

/// 默认质量
pub const DEFAULT_QUALITY: u8 = 90;

/// JPEG 编码器
pub struct JpegEncoder {
    desc: CodecDescriptor,
    quality: u8,
    restart_interval: Option<u16>,
    picture: I420Image,
    /// 交错 YCbCr 暂存区
    ycbcr: Vec<u8>,
    /// 输出码流暂存区
    output: Vec<u8>,
}

impl JpegEncoder {
    pub fn create(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Box<dyn Codec>> {
        Ok(Box::new(Self::new(desc, verbose)?))
    }

    pub fn new(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Self> {
        desc.check_dimensions()?;
        if !matches!(desc.output_format, FourCc::JPEG | FourCc::MJPG) {
            return Err(VtxError::Unsupported(format!(
                "JPEG 编码器不支持输出格式 {}",
                desc.output_format
            )));
        }
        if !vtx_scale::is_supported(desc.input_format) {
            return Err(VtxError::Unsupported(format!(
                "JPEG 编码器不支持输入格式 {}",
                desc.input_format
            )));
        }
        if desc.width > u32::from(u16::MAX) || desc.height > u32::from(u16::MAX) {
            return Err(VtxError::InvalidArgument(format!(
                "JPEG 分辨率超出范围: {}x{}",
                desc.width, desc.height
            )));
        }

        let quality = desc
            .options
            .get_u32(OPT_QUALITY)?
            .map_or(DEFAULT_QUALITY, |q| q.clamp(1, 100) as u8);
        let restart_interval = desc
            .options
            .get_u32(OPT_DRI)?
            .map(|d| d.min(u32::from(u16::MAX)) as u16)
            .filter(|&d| d > 0);

        if verbose > 0 {
            info!(
                "JPEG 编码器: {}x{}, 质量={quality}, DRI={restart_interval:?}",
                desc.width, desc.height
            );
        } else {
            debug!(
                "JPEG 编码器: {}x{}, 质量={quality}, DRI={restart_interval:?}",
                desc.width, desc.height
            );
        }

        let pixels = desc.width as usize * desc.height as usize;
        Ok(Self {
            desc: desc.clone(),
            quality,
            restart_interval,
            picture: I420Image::new(desc.width, desc.height),
            ycbcr: Vec::with_capacity(pixels * 3),
            output: Vec::new(),
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// I420 展开为全分辨率交错 YCbCr
    fn interleave(&mut self) {
        let w = self.picture.width() as usize;
        let h = self.picture.height() as usize;
        let cw = self.picture.chroma_width();
        let (y, u, v) = (self.picture.y(), self.picture.u(), self.picture.v());

        self.ycbcr.clear();
        for row in 0..h {
            let crow = (row / 2) * cw;
            for col in 0..w {
                let ci = crow + col / 2;
                self.ycbcr.extend_from_slice(&[y[row * w + col], u[ci], v[ci]]);
            }
        }
    }
}

impl Codec for JpegEncoder {
    fn name(&self) -> &str {
        "jpeg"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Jpeg
    }

    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn convert(&mut self, input: &[u8], sink: &mut dyn FrameSink) -> VtxResult<ConvertOutcome> {
        to_i420(input, self.desc.input_format, &mut self.picture)?;
        self.interleave();

        self.output.clear();
        let mut encoder = Encoder::new(&mut self.output, self.quality);
        encoder.set_sampling_factor(SamplingFactor::F_2_2);
        if let Some(interval) = self.restart_interval {
            encoder.set_restart_interval(interval);
        }
        encoder
            .encode(
                &self.ycbcr,
                self.desc.width as u16,
                self.desc.height as u16,
                ColorType::Ycbcr,
            )
            .map_err(|e| VtxError::Codec(format!("JPEG 编码失败: {e}")))
            .inspect_err(|e| warn!("{e}"))?;

        let mut outcome = ConvertOutcome::default();
        write_packet("jpeg", sink, &self.output, &mut outcome)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CodecOptions;
    use vtx_core::MemorySink;

    fn gradient_yuyv(w: usize, h: usize) -> Vec<u8> {
        let mut frame = Vec::with_capacity(w * h * 2);
        for row in 0..h {
            for col in 0..w / 2 {
                let y = ((row + col * 2) % 220 + 16) as u8;
                frame.extend_from_slice(&[y, 100, y, 150]);
            }
        }
        frame
    }

    #[test]
    fn test_jpeg_编码输出合法码流() {
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::MJPG, 64, 48);
        let mut codec = JpegEncoder::new(&desc, 0).unwrap();
        assert_eq!(codec.quality(), DEFAULT_QUALITY);

        let sink = MemorySink::new(FourCc::MJPG, 64, 48, 0);
        let mut writer = sink.clone();
        let outcome = codec.convert(&gradient_yuyv(64, 48), &mut writer).unwrap();
        assert_eq!(outcome.packets, 1);

        let packet = &sink.packets()[0];
        // SOI ... EOI
        assert_eq!(&packet[..2], &[0xFF, 0xD8]);
        assert_eq!(&packet[packet.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_jpeg_重启间隔写入_dri() {
        let opts: CodecOptions = [(OPT_DRI, "4"), (OPT_QUALITY, "150")].into_iter().collect();
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::JPEG, 64, 48).with_options(opts);
        let mut codec = JpegEncoder::new(&desc, 0).unwrap();
        assert_eq!(codec.quality(), 100);

        let sink = MemorySink::new(FourCc::JPEG, 64, 48, 0);
        let mut writer = sink.clone();
        codec.convert(&gradient_yuyv(64, 48), &mut writer).unwrap();
        let packet = &sink.packets()[0];
        assert!(packet.windows(2).any(|w| w == [0xFF, 0xDD]));
    }

    #[test]
    fn test_jpeg_非法输出格式() {
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::H264, 64, 48);
        assert!(matches!(
            JpegEncoder::new(&desc, 0),
            Err(VtxError::Unsupported(_))
        ));
    }

    #[test]
    fn test_jpeg_非法选项值() {
        let opts: CodecOptions = [(OPT_QUALITY, "high")].into_iter().collect();
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::MJPG, 64, 48).with_options(opts);
        assert!(matches!(
            JpegEncoder::new(&desc, 0),
            Err(VtxError::InvalidArgument(_))
        ));
    }
}
