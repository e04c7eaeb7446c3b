//! GPU / IL 硬件编码后端.
//!
//! 硬件引擎自己管理输入与输出缓冲区:
//! 1. 把采集帧转换为引擎要求的输入格式, 写入 `input_buffer`;
//! 2. `encode_frame` 提交编码;
//! 3. `lock_output` 锁定输出缓冲区, 写出一个数据包, 再解锁.
//!
//! 解锁由 [`OutputLock`] 在 drop 时完成, 写出失败时同样会释放驱动缓冲区.

use log::{debug, info, warn};
use vtx_core::{FourCc, FrameSink, VtxError, VtxResult};
use vtx_scale::{I420Image, from_i420, is_supported, to_i420};

use crate::codec::{BackendKind, Codec, ConvertOutcome, write_packet};
use crate::descriptor::{
    CodecDescriptor, OPT_BITRATE, OPT_DEVICE, OPT_GOP, OPT_LEVEL, OPT_PROFILE,
};

/// 硬件编码标准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCodec {
    H264,
    Hevc,
}

/// 引擎会话参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwConfig {
    pub codec: HwCodec,
    pub width: u32,
    pub height: u32,
    /// 设备序号 (多 GPU 时选择)
    pub device: u32,
    pub profile: Option<String>,
    pub level: Option<String>,
    /// 目标码率 (kbit/s)
    pub bitrate: Option<u32>,
    pub gop: Option<u32>,
    /// 低延迟预设
    pub low_latency: bool,
    pub verbose: u8,
}

impl HwConfig {
    pub fn from_descriptor(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Self> {
        desc.check_dimensions()?;
        let codec = match desc.output_format {
            FourCc::H264 => HwCodec::H264,
            FourCc::HEVC => HwCodec::Hevc,
            other => {
                return Err(VtxError::Unsupported(format!(
                    "硬件后端不支持输出格式 {other}"
                )));
            }
        };
        if !is_supported(desc.input_format) {
            return Err(VtxError::Unsupported(format!(
                "硬件后端不支持输入格式 {}",
                desc.input_format
            )));
        }
        Ok(Self {
            codec,
            width: desc.width,
            height: desc.height,
            device: desc.options.get_u32(OPT_DEVICE)?.unwrap_or(0),
            profile: desc.options.get(OPT_PROFILE).map(str::to_string),
            level: desc.options.get(OPT_LEVEL).map(str::to_string),
            bitrate: desc.options.get_u32(OPT_BITRATE)?,
            gop: desc.options.get_u32(OPT_GOP)?,
            low_latency: true,
            verbose,
        })
    }
}

/// 硬件编码引擎
pub trait HwEngine: Send {
    fn open(config: &HwConfig) -> VtxResult<Self>
    where
        Self: Sized;

    fn name(&self) -> &str;

    /// 引擎输入缓冲区的像素格式
    fn input_format(&self) -> FourCc;

    /// 引擎持有的输入缓冲区, 至少容纳一帧
    fn input_buffer(&mut self) -> &mut [u8];

    /// 编码输入缓冲区中的帧
    fn encode_frame(&mut self) -> VtxResult<()>;

    /// 锁定输出缓冲区
    fn lock_output(&mut self) -> VtxResult<()>;

    /// 已锁定的输出数据, 只在 `lock_output` 与 `unlock_output` 之间有效
    fn locked_output(&self) -> &[u8];

    /// 释放输出缓冲区
    fn unlock_output(&mut self);
}

/// 输出缓冲区锁, drop 时解锁
pub struct OutputLock<'a, E: HwEngine> {
    engine: &'a mut E,
}

impl<'a, E: HwEngine> OutputLock<'a, E> {
    pub fn acquire(engine: &'a mut E) -> VtxResult<Self> {
        engine.lock_output()?;
        Ok(Self { engine })
    }

    pub fn data(&self) -> &[u8] {
        self.engine.locked_output()
    }
}

impl<E: HwEngine> Drop for OutputLock<'_, E> {
    fn drop(&mut self) {
        self.engine.unlock_output();
    }
}

/// 硬件编码后端
pub struct HwBackend<E: HwEngine> {
    desc: CodecDescriptor,
    name: String,
    engine: E,
    picture: I420Image,
}

impl<E: HwEngine + 'static> HwBackend<E> {
    pub fn create(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Box<dyn Codec>> {
        let config = HwConfig::from_descriptor(desc, verbose)?;
        let engine = E::open(&config)?;
        Ok(Box::new(Self::with_engine(desc, &config, engine)?))
    }
}

impl<E: HwEngine> HwBackend<E> {
    /// 使用已打开的引擎构造, 引擎输入格式必须可由 I420 转换得到
    pub fn with_engine(desc: &CodecDescriptor, config: &HwConfig, engine: E) -> VtxResult<Self> {
        if !is_supported(engine.input_format()) {
            return Err(VtxError::Unsupported(format!(
                "{}: 引擎输入格式 {} 无法转换",
                engine.name(),
                engine.input_format()
            )));
        }
        if config.verbose > 0 {
            info!("{}: {config:?}, 输入格式 {}", engine.name(), engine.input_format());
        } else {
            debug!("{}: {config:?}, 输入格式 {}", engine.name(), engine.input_format());
        }
        Ok(Self {
            desc: desc.clone(),
            name: engine.name().to_string(),
            engine,
            picture: I420Image::new(desc.width, desc.height),
        })
    }
}

impl<E: HwEngine> Codec for HwBackend<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Hardware
    }

    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn convert(&mut self, input: &[u8], sink: &mut dyn FrameSink) -> VtxResult<ConvertOutcome> {
        to_i420(input, self.desc.input_format, &mut self.picture)?;
        let format = self.engine.input_format();
        from_i420(&self.picture, format, self.engine.input_buffer())?;

        let name = &self.name;
        self.engine
            .encode_frame()
            .inspect_err(|e| warn!("{name}: 硬件编码失败: {e}"))?;

        let lock = OutputLock::acquire(&mut self.engine)
            .inspect_err(|e| warn!("{name}: 锁定输出缓冲区失败: {e}"))?;
        let mut outcome = ConvertOutcome::default();
        write_packet(name, sink, lock.data(), &mut outcome)?;
        Ok(outcome)
    }
}
