//! 原始格式直通 / 重排后端.
//!
//! 注册在编码表的通配键上. 两种工作方式:
//! - 重排: 输入与输出都是可识别的原始格式且不同, 经 I420 中转;
//! - 复制: 格式相同, 或输出格式不可识别 (未知 FourCC / 通配), 原样复制.
//!
//! 已知的压缩输出格式 (MJPG, VP80, H264 等) 在构造时拒绝.
//!
//! 每帧恰好写出一个数据包, 长度为输出端声明的缓冲区大小
//! (输出端未声明时取一帧的字节数). 不足部分补零.

use log::{debug, info};
use vtx_core::pixel_format::is_compressed;
use vtx_core::{FourCc, FrameSink, VtxError, VtxResult};
use vtx_scale::{I420Image, from_i420, is_supported, to_i420};

use crate::codec::{BackendKind, Codec, ConvertOutcome, raw_packet_len, write_packet};
use crate::descriptor::CodecDescriptor;

/// 工作方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughMode {
    /// 原样复制
    Copy,
    /// 经 I420 重排为输出格式
    Reformat,
}

/// 直通后端
pub struct Passthrough {
    desc: CodecDescriptor,
    mode: PassthroughMode,
    /// 重排模式下的 I420 中间图像
    picture: Option<I420Image>,
    /// 输出包暂存区, 跨帧复用
    packet: Vec<u8>,
}

impl Passthrough {
    /// 工厂函数
    pub fn create(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Box<dyn Codec>> {
        Ok(Box::new(Self::new(desc, verbose)?))
    }

    pub fn new(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Self> {
        desc.check_dimensions()?;
        let mode = select_mode(desc.input_format, desc.output_format)?;
        let picture = match mode {
            PassthroughMode::Reformat => Some(I420Image::new(desc.width, desc.height)),
            PassthroughMode::Copy => None,
        };
        if verbose > 0 {
            info!(
                "passthrough: {} → {}, {}x{}, 模式={mode:?}",
                desc.input_format,
                desc.output_format,
                desc.width,
                desc.height
            );
        }
        Ok(Self {
            desc: desc.clone(),
            mode,
            picture,
            packet: Vec::new(),
        })
    }

    pub fn mode(&self) -> PassthroughMode {
        self.mode
    }
}

fn select_mode(input: FourCc, output: FourCc) -> VtxResult<PassthroughMode> {
    if input == output {
        return Ok(PassthroughMode::Copy);
    }
    // 已知的压缩格式需要真正的编码器, 不能把原始帧冒充为压缩流
    if is_compressed(output) {
        return Err(VtxError::Unsupported(format!(
            "passthrough: 无法生成压缩格式 {output}"
        )));
    }
    if !is_supported(output) {
        return Ok(PassthroughMode::Copy);
    }
    if is_supported(input) {
        return Ok(PassthroughMode::Reformat);
    }
    Err(VtxError::Unsupported(format!(
        "passthrough: 无法将 {input} 重排为 {output}"
    )))
}

impl Codec for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Passthrough
    }

    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn convert(&mut self, input: &[u8], sink: &mut dyn FrameSink) -> VtxResult<ConvertOutcome> {
        let len = raw_packet_len(&self.desc, sink)?.unwrap_or(input.len());
        self.packet.clear();
        self.packet.resize(len, 0);

        match (self.mode, self.picture.as_mut()) {
            (PassthroughMode::Reformat, Some(picture)) => {
                to_i420(input, self.desc.input_format, picture)?;
                from_i420(picture, self.desc.output_format, &mut self.packet)?;
            }
            _ => {
                let n = input.len().min(len);
                if n < input.len() {
                    debug!("passthrough: 输入 {} 字节超出缓冲区 {len}, 截断", input.len());
                }
                self.packet[..n].copy_from_slice(&input[..n]);
            }
        }

        let mut outcome = ConvertOutcome::default();
        write_packet("passthrough", sink, &self.packet, &mut outcome)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtx_core::MemorySink;
    use vtx_core::pixel_format::frame_size;

    #[test]
    fn test_模式选择() {
        assert_eq!(
            select_mode(FourCc::YUYV, FourCc::YUYV).unwrap(),
            PassthroughMode::Copy
        );
        assert_eq!(
            select_mode(FourCc::YUYV, FourCc::NV12).unwrap(),
            PassthroughMode::Reformat
        );
        assert_eq!(
            select_mode(FourCc::MJPG, FourCc::ANY).unwrap(),
            PassthroughMode::Copy
        );
        assert!(select_mode(FourCc::MJPG, FourCc::NV12).is_err());
    }

    #[test]
    fn test_拒绝压缩输出格式() {
        for output in [
            FourCc::VP80,
            FourCc::VP90,
            FourCc::H264,
            FourCc::HEVC,
            FourCc::MJPG,
            FourCc::JPEG,
        ] {
            let desc = CodecDescriptor::new(FourCc::YUYV, output, 16, 16);
            assert!(
                matches!(Passthrough::new(&desc, 0), Err(VtxError::Unsupported(_))),
                "{output}"
            );
        }
        // 未知 FourCC 仍按复制处理
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::new(*b"XXXX"), 16, 16);
        assert_eq!(
            Passthrough::new(&desc, 0).unwrap().mode(),
            PassthroughMode::Copy
        );
    }

    #[test]
    fn test_重排输出一个缓冲区大小的包() {
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::YU12, 640, 480);
        let mut codec = Passthrough::new(&desc, 0).unwrap();
        let out_size = frame_size(FourCc::YU12, 640, 480).unwrap();
        let sink = MemorySink::new(FourCc::YU12, 640, 480, out_size + 4096);
        let mut writer = sink.clone();

        let frame = vec![0x80u8; frame_size(FourCc::YUYV, 640, 480).unwrap()];
        let outcome = codec.convert(&frame, &mut writer).unwrap();

        assert_eq!(outcome.packets, 1);
        let packets = sink.packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), out_size + 4096);
        // 多出的尾部保持为零
        assert!(packets[0][out_size..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_复制模式补零() {
        let desc = CodecDescriptor::new(FourCc::GREY, FourCc::GREY, 4, 2);
        let mut codec = Passthrough::new(&desc, 0).unwrap();
        let sink = MemorySink::new(FourCc::GREY, 4, 2, 12);
        let mut writer = sink.clone();
        codec.convert(&[1, 2, 3, 4, 5, 6, 7, 8], &mut writer).unwrap();
        assert_eq!(
            sink.packets()[0].as_ref(),
            &[1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_缓冲区过小() {
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::NV12, 16, 16);
        let mut codec = Passthrough::new(&desc, 0).unwrap();
        let mut sink = MemorySink::new(FourCc::NV12, 16, 16, 100);
        let frame = vec![0u8; 16 * 16 * 2];
        assert!(matches!(
            codec.convert(&frame, &mut sink),
            Err(VtxError::InvalidArgument(_))
        ));
        assert_eq!(sink.write_calls(), 0);
    }

    #[test]
    fn test_输入不足一帧() {
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::NV12, 16, 16);
        let mut codec = Passthrough::new(&desc, 0).unwrap();
        let mut sink = MemorySink::new(FourCc::NV12, 16, 16, 0);
        assert!(matches!(
            codec.convert(&[0u8; 10], &mut sink),
            Err(VtxError::InvalidData(_))
        ));
    }
}
