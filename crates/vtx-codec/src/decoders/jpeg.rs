//! JPEG / MJPEG 解码器.
//!
//! 每个输入包是一张完整的 JPEG 图像. 解码结果经 I420 转为输出格式,
//! 写出一个长度为输出端缓冲区大小的数据包.

use std::io::Cursor;

use jpeg_decoder::{Decoder, PixelFormat as JpegPixelFormat};
use log::{debug, info, warn};
use vtx_core::{FourCc, FrameSink, VtxError, VtxResult};
use vtx_scale::{I420Image, from_i420, is_supported, to_i420};

use crate::codec::{BackendKind, Codec, ConvertOutcome, raw_packet_len, write_packet};
use crate::descriptor::CodecDescriptor;

/// JPEG 解码器
pub struct JpegDecoder {
    desc: CodecDescriptor,
    picture: I420Image,
    packet: Vec<u8>,
}

impl JpegDecoder {
    pub fn create(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Box<dyn Codec>> {
        Ok(Box::new(Self::new(desc, verbose)?))
    }

    pub fn new(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Self> {
        desc.check_dimensions()?;
        if !is_supported(desc.output_format) {
            return Err(VtxError::Unsupported(format!(
                "JPEG 解码器无法输出 {}",
                desc.output_format
            )));
        }
        if verbose > 0 {
            info!(
                "JPEG 解码器: {} → {}, {}x{}",
                desc.input_format, desc.output_format, desc.width, desc.height
            );
        }
        Ok(Self {
            desc: desc.clone(),
            picture: I420Image::new(desc.width, desc.height),
            packet: Vec::new(),
        })
    }

    /// 解码一张图像到 I420 暂存区
    fn decode_picture(&mut self, input: &[u8]) -> VtxResult<()> {
        let mut decoder = Decoder::new(Cursor::new(input));
        let pixels = decoder
            .decode()
            .map_err(|e| VtxError::Codec(format!("JPEG 解码失败: {e}")))?;
        let info = decoder
            .info()
            .ok_or_else(|| VtxError::Codec("JPEG 解码失败: 缺少图像信息".into()))?;

        if u32::from(info.width) != self.desc.width || u32::from(info.height) != self.desc.height {
            return Err(VtxError::InvalidData(format!(
                "JPEG 分辨率 {}x{} 与协商的 {}x{} 不一致",
                info.width, info.height, self.desc.width, self.desc.height
            )));
        }

        let format = match info.pixel_format {
            JpegPixelFormat::RGB24 => FourCc::RGB3,
            JpegPixelFormat::L8 => FourCc::GREY,
            other => {
                return Err(VtxError::Unsupported(format!(
                    "JPEG 像素格式 {other:?} 不支持"
                )));
            }
        };
        debug!("JPEG 解码: {}x{}, {format}", info.width, info.height);
        to_i420(&pixels, format, &mut self.picture)
    }
}

impl Codec for JpegDecoder {
    fn name(&self) -> &str {
        "mjpeg"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::JpegDecoder
    }

    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn convert(&mut self, input: &[u8], sink: &mut dyn FrameSink) -> VtxResult<ConvertOutcome> {
        // 输出格式在构造时已确认为原始格式
        let len = raw_packet_len(&self.desc, sink)?.unwrap_or_default();
        self.decode_picture(input)
            .inspect_err(|e| warn!("mjpeg: {e}"))?;

        self.packet.clear();
        self.packet.resize(len, 0);
        from_i420(&self.picture, self.desc.output_format, &mut self.packet)?;

        let mut outcome = ConvertOutcome::default();
        write_packet("mjpeg", sink, &self.packet, &mut outcome)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::jpeg::JpegEncoder;
    use vtx_core::MemorySink;

    fn encode_gray(w: u32, h: u32, value: u8) -> Vec<u8> {
        let desc = CodecDescriptor::new(FourCc::GREY, FourCc::MJPG, w, h);
        let mut encoder = JpegEncoder::new(&desc, 0).unwrap();
        let sink = MemorySink::new(FourCc::MJPG, w, h, 0);
        let mut writer = sink.clone();
        encoder
            .convert(&vec![value; (w * h) as usize], &mut writer)
            .unwrap();
        sink.packets()[0].to_vec()
    }

    #[test]
    fn test_mjpeg_解码为_yuyv() {
        let jpeg = encode_gray(32, 16, 120);
        let desc = CodecDescriptor::new(FourCc::MJPG, FourCc::YUYV, 32, 16);
        let mut decoder = JpegDecoder::new(&desc, 0).unwrap();
        let sink = MemorySink::new(FourCc::YUYV, 32, 16, 32 * 16 * 2);
        let mut writer = sink.clone();
        let outcome = decoder.convert(&jpeg, &mut writer).unwrap();

        assert_eq!(outcome.packets, 1);
        let packet = &sink.packets()[0];
        assert_eq!(packet.len(), 32 * 16 * 2);
        // 有损压缩, 允许少量误差
        let luma = packet[0] as i32;
        assert!((luma - 120).abs() <= 8, "luma={luma}");
    }

    #[test]
    fn test_mjpeg_分辨率不一致() {
        let jpeg = encode_gray(32, 16, 60);
        let desc = CodecDescriptor::new(FourCc::MJPG, FourCc::YUYV, 64, 48);
        let mut decoder = JpegDecoder::new(&desc, 0).unwrap();
        let mut sink = MemorySink::new(FourCc::YUYV, 64, 48, 0);
        assert!(matches!(
            decoder.convert(&jpeg, &mut sink),
            Err(VtxError::InvalidData(_))
        ));
        assert_eq!(sink.write_calls(), 0);
    }

    #[test]
    fn test_mjpeg_输出缓冲区小于一帧() {
        let jpeg = encode_gray(32, 16, 60);
        let desc = CodecDescriptor::new(FourCc::MJPG, FourCc::YUYV, 32, 16);
        let mut decoder = JpegDecoder::new(&desc, 0).unwrap();
        let mut sink = MemorySink::new(FourCc::YUYV, 32, 16, 100);
        assert!(matches!(
            decoder.convert(&jpeg, &mut sink),
            Err(VtxError::InvalidArgument(_))
        ));
        assert_eq!(sink.write_calls(), 0);
    }

    #[test]
    fn test_mjpeg_损坏数据不写出() {
        let desc = CodecDescriptor::new(FourCc::MJPG, FourCc::NV12, 32, 16);
        let mut decoder = JpegDecoder::new(&desc, 0).unwrap();
        let mut sink = MemorySink::new(FourCc::NV12, 32, 16, 0);
        assert!(decoder.convert(&[0xFF, 0xD8, 0x00, 0x01], &mut sink).is_err());
        assert_eq!(sink.write_calls(), 0);
    }

    #[test]
    fn test_mjpeg_输出格式必须是原始格式() {
        let desc = CodecDescriptor::new(FourCc::MJPG, FourCc::H264, 32, 16);
        assert!(matches!(
            JpegDecoder::new(&desc, 0),
            Err(VtxError::Unsupported(_))
        ));
    }
}
