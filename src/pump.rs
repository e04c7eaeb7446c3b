//! 帧泵循环.
//!
//! 一个泵绑定一对采集端/输出端和一个编解码器实例, 单线程同步运行:
//!
//! ```text
//! Idle ──new()──▶ Streaming ──读错误 / 流结束 / 停止令牌──▶ Stopped
//! ```
//!
//! 每次迭代: 检查停止令牌 → 有界等待就绪 → 读一帧 → `convert` → 记录耗时.
//! 帧严格按采集顺序处理, 第 N 帧的输出全部写完后才读取第 N+1 帧.

use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use vtx_codec::{Codec, CodecDescriptor, CodecOptions, CodecRegistry};
use vtx_core::{FourCc, FrameSink, FrameSource, Readiness, VtxError, VtxResult};

use crate::stop::StopToken;

/// 默认就绪等待超时
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// 采集端未声明帧大小且格式无固定帧大小时的读缓冲区
const FALLBACK_READ_BUFFER: usize = 4 * 1024 * 1024;

/// 泵参数
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// 期望的输出格式
    pub output_format: FourCc,
    /// 编解码器选项
    pub options: CodecOptions,
    /// 日志详细级别, 传给编解码器工厂
    pub verbose: u8,
    /// 就绪等待超时
    pub poll_timeout: Duration,
}

impl PumpConfig {
    pub fn new(output_format: FourCc) -> Self {
        Self {
            output_format,
            options: CodecOptions::new(),
            verbose: 0,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

/// 泵状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Streaming,
    Stopped,
}

/// 停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 读取或就绪等待失败
    ReadError,
    /// 采集端已耗尽 (读取返回 `UnexpectedEof`)
    EndOfStream,
    /// 停止令牌被触发
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadError => write!(f, "读取错误"),
            Self::EndOfStream => write!(f, "流结束"),
            Self::Cancelled => write!(f, "已取消"),
        }
    }
}

/// 流统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// 读取到的帧数
    pub frames: u64,
    /// `convert` 失败的帧数
    pub dropped: u64,
    /// 写出的数据包数
    pub packets: u64,
    /// 输出端接受的字节数
    pub bytes: u64,
    /// 采集 (读取) 累计耗时
    pub capture_total: Duration,
    /// 编码累计耗时
    pub encode_total: Duration,
    /// 单帧最大编码耗时
    pub max_encode: Duration,
}

impl PumpStats {
    /// 平均编码耗时
    pub fn avg_encode(&self) -> Duration {
        match u32::try_from(self.frames) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.encode_total / n,
        }
    }
}

/// 泵结束时的报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    pub reason: StopReason,
    pub stats: PumpStats,
}

/// 帧泵
pub struct Pump<S: FrameSource, K: FrameSink> {
    source: S,
    sink: K,
    codec: Box<dyn Codec>,
    state: PumpState,
    poll_timeout: Duration,
    frame: Vec<u8>,
    stats: PumpStats,
}

impl<S: FrameSource, K: FrameSink> Pump<S, K> {
    /// 按采集端参数与期望输出格式创建编解码器
    ///
    /// 工厂失败时直接返回错误, 不进入流状态.
    pub fn new(
        registry: &CodecRegistry,
        source: S,
        sink: K,
        config: &PumpConfig,
    ) -> VtxResult<Self> {
        let desc = CodecDescriptor::new(
            source.format(),
            config.output_format,
            source.width(),
            source.height(),
        )
        .with_options(config.options.clone());
        let codec = registry.create(&desc, config.verbose)?;
        Ok(Self::with_codec(source, sink, codec, config.poll_timeout))
    }

    /// 使用已构造的编解码器
    pub fn with_codec(source: S, sink: K, codec: Box<dyn Codec>, poll_timeout: Duration) -> Self {
        let declared = source.buffer_size();
        let read_size = if declared > 0 {
            declared
        } else {
            vtx_core::pixel_format::frame_size(source.format(), source.width(), source.height())
                .unwrap_or(FALLBACK_READ_BUFFER)
        };
        Self {
            source,
            sink,
            codec,
            state: PumpState::Idle,
            poll_timeout,
            frame: vec![0; read_size],
            stats: PumpStats::default(),
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// 运行到停止, 消耗泵 (编解码器与输出端随之释放)
    pub fn run(mut self, stop: &StopToken) -> PumpReport {
        self.state = PumpState::Streaming;
        info!(
            "开始推流: {} {} → {}, {}x{}",
            self.codec.name(),
            self.source.format(),
            self.codec.descriptor().output_format,
            self.source.width(),
            self.source.height()
        );

        let reason = loop {
            if stop.is_stopped() {
                break StopReason::Cancelled;
            }
            match self.step() {
                Ok(None) => {}
                Ok(Some(reason)) => break reason,
                Err(e) => {
                    warn!("采集失败, 停止推流: {e}");
                    break StopReason::ReadError;
                }
            }
        };

        self.state = PumpState::Stopped;
        let stats = self.stats;
        info!(
            "推流结束 ({reason}): {} 帧, 丢弃 {}, {} 包 / {} 字节, 平均编码 {:.2} ms, 最大 {:.2} ms",
            stats.frames,
            stats.dropped,
            stats.packets,
            stats.bytes,
            ms(stats.avg_encode()),
            ms(stats.max_encode)
        );
        PumpReport { reason, stats }
    }

    /// 执行一次迭代, 返回 `Some` 表示流应当结束
    fn step(&mut self) -> io::Result<Option<StopReason>> {
        if self.source.poll_readable(self.poll_timeout)? == Readiness::Timeout {
            return Ok(None);
        }

        let started = Instant::now();
        let n = match self.source.read(&mut self.frame) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Ok(Some(StopReason::EndOfStream));
            }
            Err(e) => return Err(e),
        };
        let capture = started.elapsed();
        self.stats.frames += 1;
        self.stats.capture_total += capture;
        if n == 0 {
            // 驱动可能出队 bytesused 为 0 的缓冲区, 跳过该帧继续采集
            self.stats.dropped += 1;
            debug!("帧 {}: 空帧, 跳过", self.stats.frames);
            return Ok(None);
        }

        let started = Instant::now();
        let result = self.codec.convert(&self.frame[..n], &mut self.sink);
        let encode = started.elapsed();
        self.stats.encode_total += encode;
        self.stats.max_encode = self.stats.max_encode.max(encode);

        match result {
            Ok(outcome) => {
                self.stats.packets += outcome.packets as u64;
                self.stats.bytes += outcome.bytes as u64;
            }
            Err(e) => {
                self.stats.dropped += 1;
                log_dropped(self.stats.frames, &e);
            }
        }
        debug!(
            "帧 {}: 采集 {:.2} ms, 编码 {:.2} ms",
            self.stats.frames,
            ms(capture),
            ms(encode)
        );
        Ok(None)
    }
}

fn log_dropped(frame: u64, err: &VtxError) {
    match err {
        VtxError::InvalidData(_) => debug!("丢弃第 {frame} 帧: {err}"),
        _ => warn!("丢弃第 {frame} 帧: {err}"),
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtx_core::{MemorySink, MemorySource};

    fn registry() -> CodecRegistry {
        let mut registry = CodecRegistry::new();
        vtx_codec::register_all(&mut registry);
        registry
    }

    #[test]
    fn test_超时后继续等待() {
        let mut source = MemorySource::new(FourCc::GREY, 4, 4, 16);
        source
            .push_idle()
            .push_frame(vec![1u8; 16])
            .push_idle()
            .push_frame(vec![2u8; 16]);
        let sink = MemorySink::new(FourCc::GREY, 4, 4, 16);
        let pump = Pump::new(&registry(), source, sink.clone(), &PumpConfig::new(FourCc::GREY))
            .unwrap();
        assert_eq!(pump.state(), PumpState::Idle);

        let report = pump.run(&StopToken::new());
        assert_eq!(report.reason, StopReason::EndOfStream);
        assert_eq!(report.stats.frames, 2);
        assert_eq!(sink.packets().len(), 2);
    }

    #[test]
    fn test_空帧跳过后继续采集() {
        let mut source = MemorySource::new(FourCc::GREY, 4, 4, 16);
        source
            .push_frame(vec![1u8; 16])
            .push_frame(Vec::new())
            .push_frame(vec![3u8; 16]);
        let sink = MemorySink::new(FourCc::GREY, 4, 4, 16);
        let pump = Pump::new(&registry(), source, sink.clone(), &PumpConfig::new(FourCc::GREY))
            .unwrap();

        let report = pump.run(&StopToken::new());
        assert_eq!(report.reason, StopReason::EndOfStream);
        assert_eq!(report.stats.frames, 3);
        assert_eq!(report.stats.dropped, 1);
        let packets = sink.packets();
        assert_eq!(packets.len(), 2);
        assert!(packets[1].iter().all(|&b| b == 3));
    }

    #[test]
    fn test_停止令牌优先() {
        let mut source = MemorySource::new(FourCc::GREY, 4, 4, 16);
        source.push_frame(vec![1u8; 16]);
        let sink = MemorySink::new(FourCc::GREY, 4, 4, 16);
        let pump = Pump::new(&registry(), source, sink.clone(), &PumpConfig::new(FourCc::GREY))
            .unwrap();
        let stop = StopToken::new();
        stop.stop();
        let report = pump.run(&stop);
        assert_eq!(report.reason, StopReason::Cancelled);
        assert_eq!(sink.write_calls(), 0);
    }

    #[test]
    fn test_构造失败不进入流状态() {
        let source = MemorySource::new(FourCc::MJPG, 4, 4, 0);
        let sink = MemorySink::new(FourCc::VP80, 4, 4, 0);
        let result = Pump::new(&registry(), source, sink, &PumpConfig::new(FourCc::VP80));
        assert!(matches!(result, Err(VtxError::Unsupported(_))));
    }

    #[test]
    fn test_平均编码耗时() {
        let stats = PumpStats {
            frames: 4,
            encode_total: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(stats.avg_encode(), Duration::from_micros(2500));
        assert_eq!(PumpStats::default().avg_encode(), Duration::ZERO);
    }
}
