//! 编解码器契约.
//!
//! 每个后端实例绑定一组 (输入格式, 输出格式, 宽, 高), 只暴露一个 `convert` 操作:
//! 输入一帧, 向输出端写出 0..N 个数据包.
//!
//! 生命周期: 构造 → 反复 `convert` → drop. 构造失败时不存在实例;
//! drop 时释放引擎会话与暂存缓冲区.

use log::warn;
use vtx_core::{FrameSink, VtxError, VtxResult, pixel_format};

use crate::descriptor::CodecDescriptor;

/// 后端类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// 原始格式直通 / 重排
    Passthrough,
    /// JPEG 静态图像编码
    Jpeg,
    /// JPEG/MJPEG 解码为原始格式
    JpegDecoder,
    /// VP8/VP9 块编码
    Vpx,
    /// H.264/H.265 NAL 编码
    Nal,
    /// GPU / IL 硬件编码
    Hardware,
}

/// 一次 `convert` 写出的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOutcome {
    /// 写出的数据包数
    pub packets: usize,
    /// 输出端实际接受的字节数
    pub bytes: usize,
}

/// 编解码器 trait
///
/// 实例不可并发使用: `convert` 需要 `&mut self`, 同一时刻只属于一个泵循环.
///
/// 失败策略: 引擎报错时记录日志并返回 `Err`, 该帧不写出任何数据,
/// 实例状态保持完好, 下一帧照常可用.
pub trait Codec: Send {
    /// 后端名称 (用于日志)
    fn name(&self) -> &str;

    /// 后端类别
    fn kind(&self) -> BackendKind;

    /// 构造时使用的描述符
    fn descriptor(&self) -> &CodecDescriptor;

    /// 转换一帧并写入 `sink`
    ///
    /// 所有输出单元在返回前写完. 部分写入记录警告, 不重试, 该帧仍视为已消费.
    fn convert(&mut self, input: &[u8], sink: &mut dyn FrameSink) -> VtxResult<ConvertOutcome>;
}

/// 向输出端写入一个数据包, 并累计到 `outcome`
///
/// 输出端接受的字节少于请求时只记录警告.
pub fn write_packet(
    codec: &str,
    sink: &mut dyn FrameSink,
    data: &[u8],
    outcome: &mut ConvertOutcome,
) -> VtxResult<()> {
    let written = sink.write(data)?;
    if written < data.len() {
        warn!(
            "{codec}: 输出端部分写入, 接受 {written}/{} 字节, 不重试",
            data.len()
        );
    }
    outcome.packets += 1;
    outcome.bytes += written;
    Ok(())
}

/// 原始格式输出包的长度
///
/// 取输出端声明的缓冲区大小, 未声明时取一帧的字节数.
/// 声明的缓冲区小于一帧时返回 `InvalidArgument`. 输出格式不是原始格式且
/// 输出端未声明大小时返回 `None`, 由调用方决定.
pub fn raw_packet_len(desc: &CodecDescriptor, sink: &dyn FrameSink) -> VtxResult<Option<usize>> {
    let declared = sink.buffer_size();
    match pixel_format::frame_size(desc.output_format, desc.width, desc.height) {
        Some(frame) if declared > 0 && declared < frame => Err(VtxError::InvalidArgument(format!(
            "输出端缓冲区 {declared} 字节小于一帧 {frame} 字节"
        ))),
        Some(frame) if declared == 0 => Ok(Some(frame)),
        _ if declared > 0 => Ok(Some(declared)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtx_core::{FourCc, MemorySink};

    #[test]
    fn test_write_packet_累计() {
        let mut sink = MemorySink::new(FourCc::H264, 16, 16, 0);
        let mut outcome = ConvertOutcome::default();
        write_packet("test", &mut sink, b"abcd", &mut outcome).unwrap();
        write_packet("test", &mut sink, b"ef", &mut outcome).unwrap();
        assert_eq!(
            outcome,
            ConvertOutcome {
                packets: 2,
                bytes: 6
            }
        );
    }

    #[test]
    fn test_write_packet_部分写入不重试() {
        let sink = MemorySink::new(FourCc::H264, 16, 16, 0).with_write_limit(3);
        let mut writer = sink.clone();
        let mut outcome = ConvertOutcome::default();
        write_packet("test", &mut writer, b"abcdef", &mut outcome).unwrap();
        assert_eq!(sink.write_calls(), 1);
        assert_eq!(outcome.bytes, 3);
        assert_eq!(outcome.packets, 1);
    }

    #[test]
    fn test_raw_packet_len_取声明大小() {
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::NV12, 16, 16);
        let frame = 16 * 16 * 3 / 2;
        let declared = MemorySink::new(FourCc::NV12, 16, 16, frame + 64);
        assert_eq!(raw_packet_len(&desc, &declared).unwrap(), Some(frame + 64));
        let undeclared = MemorySink::new(FourCc::NV12, 16, 16, 0);
        assert_eq!(raw_packet_len(&desc, &undeclared).unwrap(), Some(frame));
    }

    #[test]
    fn test_raw_packet_len_缓冲区过小() {
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::NV12, 16, 16);
        let sink = MemorySink::new(FourCc::NV12, 16, 16, 100);
        assert!(matches!(
            raw_packet_len(&desc, &sink),
            Err(VtxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_raw_packet_len_非原始格式() {
        let unknown = FourCc::new(*b"XXXX");
        let desc = CodecDescriptor::new(FourCc::YUYV, unknown, 16, 16);
        let sink = MemorySink::new(unknown, 16, 16, 0);
        assert_eq!(raw_packet_len(&desc, &sink).unwrap(), None);
        let sized = MemorySink::new(unknown, 16, 16, 300);
        assert_eq!(raw_packet_len(&desc, &sized).unwrap(), Some(300));
    }
}
