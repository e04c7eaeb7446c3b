//! H.264 / H.265 NAL 编码后端.
//!
//! 引擎每次编码返回有序的 NAL 单元列表 (可能为空, 也可能包含参数集 + 切片),
//! 由 [`NalAggregator`] 合并为一次写出. 参数集在每个关键帧前重复输出,
//! 中途接入的接收端也能解码.

use log::{debug, info, warn};
use vtx_core::{FourCc, FrameSink, VtxError, VtxResult};
use vtx_scale::{I420Image, is_supported, to_i420};

use crate::codec::{BackendKind, Codec, ConvertOutcome};
use crate::descriptor::{CodecDescriptor, OPT_GOP, OPT_RC_CQP, OPT_RC_CRF};
use crate::nal::NalAggregator;

/// NAL 编码标准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalCodec {
    H264,
    H265,
}

/// 码率控制方式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateControl {
    /// 引擎默认
    Default,
    /// 固定量化参数
    ConstantQp(u32),
    /// 恒定质量因子
    ConstantRateFactor(f32),
}

/// 引擎会话参数
#[derive(Debug, Clone, PartialEq)]
pub struct NalConfig {
    pub codec: NalCodec,
    pub width: u32,
    pub height: u32,
    pub rate_control: RateControl,
    /// 关键帧间隔, `None` 表示由引擎决定
    pub gop: Option<u32>,
    /// 编码线程数, 固定为 1 以保证逐帧输出
    pub threads: u32,
    /// B 帧数, 固定为 0
    pub b_frames: u32,
    /// 每个关键帧前重复 SPS/PPS
    pub repeat_headers: bool,
    pub preset: &'static str,
    pub tune: &'static str,
    pub verbose: u8,
}

impl NalConfig {
    /// 由描述符推导会话参数
    ///
    /// `RC_CQP` 与 `RC_CRF` 同时给出时 `RC_CQP` 优先.
    pub fn from_descriptor(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Self> {
        desc.check_dimensions()?;
        let codec = match desc.output_format {
            FourCc::H264 => NalCodec::H264,
            FourCc::HEVC => NalCodec::H265,
            other => {
                return Err(VtxError::Unsupported(format!(
                    "NAL 后端不支持输出格式 {other}"
                )));
            }
        };
        if !is_supported(desc.input_format) {
            return Err(VtxError::Unsupported(format!(
                "NAL 后端不支持输入格式 {}",
                desc.input_format
            )));
        }

        let rate_control = if let Some(qp) = desc.options.get_u32(OPT_RC_CQP)? {
            RateControl::ConstantQp(qp)
        } else if let Some(crf) = desc.options.get_f32(OPT_RC_CRF)? {
            RateControl::ConstantRateFactor(crf)
        } else {
            RateControl::Default
        };

        Ok(Self {
            codec,
            width: desc.width,
            height: desc.height,
            rate_control,
            gop: desc.options.get_u32(OPT_GOP)?.filter(|&g| g > 0),
            threads: 1,
            b_frames: 0,
            repeat_headers: true,
            preset: "ultrafast",
            tune: "zerolatency",
            verbose,
        })
    }
}

/// NAL 编码引擎
///
/// 返回的单元带起始码, 借用引擎内部缓冲区, 下次调用 `encode` 前有效.
pub trait NalEngine: Send {
    fn open(config: &NalConfig) -> VtxResult<Self>
    where
        Self: Sized;

    fn name(&self) -> &str;

    /// 编码一帧, 返回本次产出的 NAL 单元 (按码流顺序)
    fn encode(&mut self, picture: &I420Image, pts: i64) -> VtxResult<Vec<&[u8]>>;
}

/// NAL 编码后端
pub struct NalBackend<E: NalEngine> {
    desc: CodecDescriptor,
    name: String,
    engine: E,
    picture: I420Image,
    aggregator: NalAggregator,
    frame_index: i64,
}

impl<E: NalEngine + 'static> NalBackend<E> {
    pub fn create(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Box<dyn Codec>> {
        let config = NalConfig::from_descriptor(desc, verbose)?;
        let engine = E::open(&config)?;
        Ok(Box::new(Self::with_engine(desc, &config, engine)))
    }
}

impl<E: NalEngine> NalBackend<E> {
    /// 使用已打开的引擎构造
    pub fn with_engine(desc: &CodecDescriptor, config: &NalConfig, engine: E) -> Self {
        if config.verbose > 0 {
            info!("{}: {config:?}", engine.name());
        } else {
            debug!("{}: {config:?}", engine.name());
        }
        Self {
            desc: desc.clone(),
            name: engine.name().to_string(),
            engine,
            picture: I420Image::new(desc.width, desc.height),
            aggregator: NalAggregator::new(),
            frame_index: 0,
        }
    }
}

impl<E: NalEngine> Codec for NalBackend<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Nal
    }

    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn convert(&mut self, input: &[u8], sink: &mut dyn FrameSink) -> VtxResult<ConvertOutcome> {
        to_i420(input, self.desc.input_format, &mut self.picture)?;

        let pts = self.frame_index;
        self.frame_index += 1;
        let units = self
            .engine
            .encode(&self.picture, pts)
            .inspect_err(|e| warn!("{}: 编码第 {pts} 帧失败: {e}", self.name))?;
        if units.is_empty() {
            debug!("{}: 第 {pts} 帧暂无输出", self.name);
        }
        self.aggregator.write(&self.name, &units, sink)
    }
}
