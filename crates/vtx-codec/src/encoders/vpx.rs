//! VP8 / VP9 编码后端.
//!
//! 后端只负责参数推导, 格式转换与输出迭代; 实际压缩由 [`VpxEngine`] 完成,
//! 引擎由宿主程序通过 [`crate::encoders::register_vpx`] 注入.
//!
//! 每帧流程: 采集帧 → I420 → `encode(picture, pts, force_keyframe)` → 反复 `next_packet`
//! 直到返回 `None`, 每个帧数据项写出一个数据包, 其他类型的项跳过.

use log::{debug, info, warn};
use vtx_core::{FourCc, FrameSink, VtxError, VtxResult};
use vtx_scale::{I420Image, is_supported, to_i420};

use crate::codec::{BackendKind, Codec, ConvertOutcome, write_packet};
use crate::descriptor::{CodecDescriptor, OPT_CBR, OPT_GOP, OPT_VBR};

/// 未指定码率时的默认目标 (kbit/s)
pub const DEFAULT_BITRATE_KBPS: u32 = 1000;

/// VPx 编码标准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpxCodec {
    Vp8,
    Vp9,
}

/// 码率控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpxRateControl {
    /// 固定码率 (kbit/s)
    Cbr(u32),
    /// 可变码率 (kbit/s)
    Vbr(u32),
}

/// 引擎会话参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpxConfig {
    pub codec: VpxCodec,
    pub width: u32,
    pub height: u32,
    pub rate_control: VpxRateControl,
    /// 最大关键帧间隔, `None` 表示由引擎决定
    pub keyframe_interval: Option<u32>,
    /// 编码线程数, 固定为 1
    pub threads: u32,
    /// 实时模式 (最低延迟)
    pub realtime: bool,
    pub verbose: u8,
}

impl VpxConfig {
    /// 由描述符推导会话参数
    ///
    /// `CBR` 与 `VBR` 同时给出时 `CBR` 优先.
    pub fn from_descriptor(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Self> {
        desc.check_dimensions()?;
        let codec = match desc.output_format {
            FourCc::VP80 => VpxCodec::Vp8,
            FourCc::VP90 => VpxCodec::Vp9,
            other => {
                return Err(VtxError::Unsupported(format!(
                    "VPx 后端不支持输出格式 {other}"
                )));
            }
        };
        if !is_supported(desc.input_format) {
            return Err(VtxError::Unsupported(format!(
                "VPx 后端不支持输入格式 {}",
                desc.input_format
            )));
        }

        let rate_control = match desc.options.get_u32(OPT_CBR)? {
            Some(kbps) => VpxRateControl::Cbr(kbps),
            None => VpxRateControl::Vbr(
                desc.options
                    .get_u32(OPT_VBR)?
                    .unwrap_or(DEFAULT_BITRATE_KBPS),
            ),
        };

        Ok(Self {
            codec,
            width: desc.width,
            height: desc.height,
            rate_control,
            keyframe_interval: desc.options.get_u32(OPT_GOP)?,
            threads: 1,
            realtime: true,
            verbose,
        })
    }
}

/// 引擎输出项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpxPacket<'a> {
    /// 压缩帧数据
    Frame(&'a [u8]),
    /// 统计或其他非帧数据
    Other,
}

/// VPx 编码引擎
///
/// `next_packet` 返回的切片借用引擎内部缓冲区, 下次调用前有效.
pub trait VpxEngine: Send {
    /// 按参数打开一个编码会话
    fn open(config: &VpxConfig) -> VtxResult<Self>
    where
        Self: Sized;

    fn name(&self) -> &str;

    /// 提交一帧, `force_keyframe` 为真时该帧必须编码为关键帧
    fn encode(&mut self, picture: &I420Image, pts: i64, force_keyframe: bool) -> VtxResult<()>;

    /// 取出下一个输出项, 没有更多时返回 `None`
    fn next_packet(&mut self) -> Option<VpxPacket<'_>>;
}

/// VPx 编码后端
pub struct VpxBackend<E: VpxEngine> {
    desc: CodecDescriptor,
    engine: E,
    picture: I420Image,
    frame_index: i64,
    keyframe_interval: Option<u32>,
}

impl<E: VpxEngine + 'static> VpxBackend<E> {
    /// 工厂函数, 可直接作为 [`crate::registry::CodecFactory`] 注册
    pub fn create(desc: &CodecDescriptor, verbose: u8) -> VtxResult<Box<dyn Codec>> {
        let config = VpxConfig::from_descriptor(desc, verbose)?;
        let engine = E::open(&config)?;
        Ok(Box::new(Self::with_engine(desc, &config, engine)))
    }
}

impl<E: VpxEngine> VpxBackend<E> {
    /// 使用已打开的引擎构造
    pub fn with_engine(desc: &CodecDescriptor, config: &VpxConfig, engine: E) -> Self {
        if config.verbose > 0 {
            info!("{}: {config:?}", engine.name());
        } else {
            debug!("{}: {config:?}", engine.name());
        }
        Self {
            desc: desc.clone(),
            engine,
            picture: I420Image::new(desc.width, desc.height),
            frame_index: 0,
            keyframe_interval: config.keyframe_interval.filter(|&g| g > 0),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 首帧及每个 GOP 起点强制关键帧
    fn is_keyframe(&self, pts: i64) -> bool {
        pts == 0
            || self
                .keyframe_interval
                .is_some_and(|g| pts.rem_euclid(i64::from(g)) == 0)
    }
}

impl<E: VpxEngine> Codec for VpxBackend<E> {
    fn name(&self) -> &str {
        self.engine.name()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Vpx
    }

    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn convert(&mut self, input: &[u8], sink: &mut dyn FrameSink) -> VtxResult<ConvertOutcome> {
        to_i420(input, self.desc.input_format, &mut self.picture)?;

        let pts = self.frame_index;
        self.frame_index += 1;
        let keyframe = self.is_keyframe(pts);
        self.engine
            .encode(&self.picture, pts, keyframe)
            .inspect_err(|e| warn!("{}: 编码第 {pts} 帧失败: {e}", self.engine.name()))?;

        let mut outcome = ConvertOutcome::default();
        while let Some(packet) = self.engine.next_packet() {
            if let VpxPacket::Frame(data) = packet {
                write_packet("vpx", sink, data, &mut outcome)?;
            }
        }
        Ok(outcome)
    }
}
