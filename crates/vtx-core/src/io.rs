//! 采集源与输出端抽象.
//!
//! [`FrameSource`] 对应 V4L2 采集设备, [`FrameSink`] 对应 V4L2 输出设备或文件.
//! 泵循环与编解码器只依赖这两个 trait, 不直接接触设备.
//!
//! 另提供内存实现 [`MemorySource`] / [`MemorySink`], 用于在无硬件环境下驱动整条流水线.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;

use crate::FourCc;

/// 就绪等待结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// 有一帧可读
    Ready,
    /// 超时, 无数据
    Timeout,
}

/// 采集源
pub trait FrameSource {
    /// 帧宽度
    fn width(&self) -> u32;
    /// 帧高度
    fn height(&self) -> u32;
    /// 采集格式
    fn format(&self) -> FourCc;
    /// 每帧缓冲区字节数
    fn buffer_size(&self) -> usize;

    /// 等待可读, 最多阻塞 `timeout`
    ///
    /// 被信号打断时应返回 `Ok(Readiness::Timeout)`, 让调用方尽快检查停止标志.
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<Readiness>;

    /// 读取一帧到 `buf`, 返回实际字节数
    ///
    /// 返回 0 表示空帧 (例如驱动出队了 `bytesused == 0` 的缓冲区), 调用方应跳过并继续.
    /// 源已耗尽时返回 [`io::ErrorKind::UnexpectedEof`].
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// 输出端
pub trait FrameSink {
    /// 帧宽度
    fn width(&self) -> u32;
    /// 帧高度
    fn height(&self) -> u32;
    /// 输出格式
    fn format(&self) -> FourCc;
    /// 每帧缓冲区字节数 (原始格式输出时为整帧大小)
    fn buffer_size(&self) -> usize;

    /// 写入一个数据包, 返回实际接受的字节数
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
}

// 运行时选择输出端 (设备或文件) 时以 Box<dyn FrameSink> 传递
impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn format(&self) -> FourCc {
        (**self).format()
    }

    fn buffer_size(&self) -> usize {
        (**self).buffer_size()
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }
}

/// 内存采集源的预置事件
#[derive(Debug)]
enum SourceEvent {
    Frame(Vec<u8>),
    Idle,
    Error(io::ErrorKind),
}

/// 内存采集源
///
/// 按入队顺序回放帧, 队列耗尽后读取返回 `UnexpectedEof`.
#[derive(Debug)]
pub struct MemorySource {
    width: u32,
    height: u32,
    format: FourCc,
    buffer_size: usize,
    events: VecDeque<SourceEvent>,
}

impl MemorySource {
    /// 创建空的内存采集源
    pub fn new(format: FourCc, width: u32, height: u32, buffer_size: usize) -> Self {
        Self {
            width,
            height,
            format,
            buffer_size,
            events: VecDeque::new(),
        }
    }

    /// 追加一帧
    pub fn push_frame(&mut self, data: impl Into<Vec<u8>>) -> &mut Self {
        self.events.push_back(SourceEvent::Frame(data.into()));
        self
    }

    /// 追加一次就绪超时
    pub fn push_idle(&mut self) -> &mut Self {
        self.events.push_back(SourceEvent::Idle);
        self
    }

    /// 追加一次读取错误
    pub fn push_error(&mut self, kind: io::ErrorKind) -> &mut Self {
        self.events.push_back(SourceEvent::Error(kind));
        self
    }

    /// 剩余事件数
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl FrameSource for MemorySource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> FourCc {
        self.format
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn poll_readable(&mut self, _timeout: Duration) -> io::Result<Readiness> {
        if matches!(self.events.front(), Some(SourceEvent::Idle)) {
            self.events.pop_front();
            return Ok(Readiness::Timeout);
        }
        Ok(Readiness::Ready)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.events.pop_front() {
            Some(SourceEvent::Frame(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(SourceEvent::Error(kind)) => Err(io::Error::new(kind, "模拟读取失败")),
            Some(SourceEvent::Idle) => Ok(0),
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "内存采集源已耗尽")),
        }
    }
}

#[derive(Debug, Default)]
struct SinkState {
    packets: Vec<Bytes>,
    write_calls: usize,
}

/// 内存输出端
///
/// 记录每次 `write` 收到的数据包. 克隆体共享同一份记录,
/// 把一份交给泵循环后仍可在外部检查输出.
#[derive(Debug, Clone)]
pub struct MemorySink {
    width: u32,
    height: u32,
    format: FourCc,
    buffer_size: usize,
    /// 单次写入最多接受的字节数, 用于模拟部分写入
    write_limit: Option<usize>,
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    /// 创建内存输出端
    pub fn new(format: FourCc, width: u32, height: u32, buffer_size: usize) -> Self {
        Self {
            width,
            height,
            format,
            buffer_size,
            write_limit: None,
            state: Arc::new(Mutex::new(SinkState::default())),
        }
    }

    /// 限制单次写入接受的字节数
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        // 持锁期间不会 panic, 中毒时沿用内部数据
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 已接受的数据包 (按写入顺序)
    pub fn packets(&self) -> Vec<Bytes> {
        self.lock().packets.clone()
    }

    /// `write` 被调用的次数
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    /// 已接受的总字节数
    pub fn total_bytes(&self) -> usize {
        self.lock().packets.iter().map(Bytes::len).sum()
    }
}

impl FrameSink for MemorySink {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> FourCc {
        self.format
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let accepted = self.write_limit.map_or(data.len(), |l| l.min(data.len()));
        let mut state = self.lock();
        state.write_calls += 1;
        state.packets.push(Bytes::copy_from_slice(&data[..accepted]));
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_回放顺序() {
        let mut src = MemorySource::new(FourCc::YU12, 2, 2, 6);
        src.push_frame(vec![1u8; 6]).push_idle().push_frame(vec![2u8; 6]);

        let mut buf = [0u8; 6];
        assert_eq!(src.poll_readable(Duration::ZERO).unwrap(), Readiness::Ready);
        assert_eq!(src.read(&mut buf).unwrap(), 6);
        assert_eq!(buf, [1; 6]);
        assert_eq!(
            src.poll_readable(Duration::ZERO).unwrap(),
            Readiness::Timeout
        );
        assert_eq!(src.read(&mut buf).unwrap(), 6);
        assert_eq!(buf, [2; 6]);
        // 队列耗尽: 流结束
        let err = src.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_memory_source_空帧() {
        let mut src = MemorySource::new(FourCc::YU12, 2, 2, 6);
        src.push_frame(Vec::new()).push_frame(vec![7u8; 6]);
        let mut buf = [0u8; 6];
        assert_eq!(src.read(&mut buf).unwrap(), 0);
        assert_eq!(src.read(&mut buf).unwrap(), 6);
    }

    #[test]
    fn test_memory_source_注入错误() {
        let mut src = MemorySource::new(FourCc::YU12, 2, 2, 6);
        src.push_error(io::ErrorKind::BrokenPipe);
        let mut buf = [0u8; 6];
        let err = src.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_memory_sink_共享记录() {
        let sink = MemorySink::new(FourCc::H264, 16, 16, 0);
        let mut writer = sink.clone();
        writer.write(b"abc").unwrap();
        writer.write(b"de").unwrap();
        assert_eq!(sink.write_calls(), 2);
        assert_eq!(sink.total_bytes(), 5);
        assert_eq!(sink.packets()[1].as_ref(), b"de");
    }

    #[test]
    fn test_memory_sink_部分写入() {
        let mut sink = MemorySink::new(FourCc::H264, 16, 16, 0).with_write_limit(4);
        assert_eq!(sink.write(b"abcdef").unwrap(), 4);
        assert_eq!(sink.total_bytes(), 4);
    }
}
