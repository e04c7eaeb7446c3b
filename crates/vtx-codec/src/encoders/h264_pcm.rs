//! 内置 H.264 帧内 PCM 编码引擎.
//!
//! 每个宏块都以 I_PCM 方式存储原始采样, 不做预测与变换, 码率很高,
//! 但输出是标准的 Baseline Annex B 码流, 任何 H.264 解码器都能播放.
//! 没有外部编码库时作为 H264 输出的默认引擎.
//!
//! 码流结构:
//! - 每 `gop` 帧一个 IDR, IDR 前输出 SPS + PPS (共 3 个 NAL 单元);
//! - 其余帧为单个 I 切片 (1 个 NAL 单元);
//! - 帧宽高须为偶数, 非 16 对齐的部分通过裁剪窗口去除.

use std::ops::Range;

use log::debug;
use vtx_core::bitwriter::BitWriter;
use vtx_core::{VtxError, VtxResult};
use vtx_scale::I420Image;

use crate::encoders::h26x::{NalCodec, NalConfig, NalEngine, RateControl};
use crate::parsers::h264::{NalUnitType, write_nal_unit};

/// 未指定时的关键帧间隔
pub const DEFAULT_GOP: u32 = 250;

const PROFILE_BASELINE: u32 = 66;
/// I 切片 (本图像所有切片同类型)
const SLICE_TYPE_I_ALL: u32 = 7;
/// I 切片中 I_PCM 的 mb_type
const MB_TYPE_I_PCM: u32 = 25;
/// log2_max_frame_num_minus4 = 0, frame_num 占 4 位
const FRAME_NUM_BITS: u32 = 4;
/// level 5.1 允许的最大帧宏块数
const LEVEL_51_MAX_FS: u32 = 36864;

/// 帧内 PCM 引擎
pub struct IntraPcmEngine {
    width: u32,
    height: u32,
    mb_width: u32,
    mb_height: u32,
    gop: u32,
    /// 当前 GOP 内的帧序号
    frame_num: u32,
    idr_pic_id: u32,
    /// 本帧输出的全部单元 (带起始码)
    stream: Vec<u8>,
    units: Vec<Range<usize>>,
}

impl IntraPcmEngine {
    fn write_sps(&mut self) {
        let mut bw = BitWriter::with_capacity(32);
        bw.write_bits(PROFILE_BASELINE, 8);
        // constraint_set0_flag + constraint_set1_flag
        bw.write_bits(0xC0, 8);
        let level = if self.mb_width * self.mb_height > LEVEL_51_MAX_FS {
            62
        } else {
            51
        };
        bw.write_bits(level, 8);
        bw.write_ue(0); // seq_parameter_set_id
        bw.write_ue(FRAME_NUM_BITS - 4);
        bw.write_ue(2); // pic_order_cnt_type
        bw.write_ue(1); // max_num_ref_frames
        bw.write_flag(false); // gaps_in_frame_num_value_allowed_flag
        bw.write_ue(self.mb_width - 1);
        bw.write_ue(self.mb_height - 1);
        bw.write_flag(true); // frame_mbs_only_flag
        bw.write_flag(true); // direct_8x8_inference_flag

        // 4:2:0 逐行: 裁剪单位为 2 像素
        let crop_right = (self.mb_width * 16 - self.width) / 2;
        let crop_bottom = (self.mb_height * 16 - self.height) / 2;
        let cropping = crop_right > 0 || crop_bottom > 0;
        bw.write_flag(cropping);
        if cropping {
            bw.write_ue(0);
            bw.write_ue(crop_right);
            bw.write_ue(0);
            bw.write_ue(crop_bottom);
        }
        bw.write_flag(false); // vui_parameters_present_flag
        bw.write_trailing_bits();
        self.push_unit(NalUnitType::Sps, 3, &bw.finish());
    }

    fn write_pps(&mut self) {
        let mut bw = BitWriter::with_capacity(8);
        bw.write_ue(0); // pic_parameter_set_id
        bw.write_ue(0); // seq_parameter_set_id
        bw.write_flag(false); // entropy_coding_mode_flag (CAVLC)
        bw.write_flag(false); // bottom_field_pic_order_in_frame_present_flag
        bw.write_ue(0); // num_slice_groups_minus1
        bw.write_ue(0); // num_ref_idx_l0_default_active_minus1
        bw.write_ue(0); // num_ref_idx_l1_default_active_minus1
        bw.write_flag(false); // weighted_pred_flag
        bw.write_bits(0, 2); // weighted_bipred_idc
        bw.write_se(0); // pic_init_qp_minus26
        bw.write_se(0); // pic_init_qs_minus26
        bw.write_se(0); // chroma_qp_index_offset
        bw.write_flag(true); // deblocking_filter_control_present_flag
        bw.write_flag(false); // constrained_intra_pred_flag
        bw.write_flag(false); // redundant_pic_cnt_present_flag
        bw.write_trailing_bits();
        self.push_unit(NalUnitType::Pps, 3, &bw.finish());
    }

    fn write_slice(&mut self, picture: &I420Image, idr: bool) {
        let mbs = (self.mb_width * self.mb_height) as usize;
        let mut bw = BitWriter::with_capacity(mbs * 386 + 16);

        bw.write_ue(0); // first_mb_in_slice
        bw.write_ue(SLICE_TYPE_I_ALL);
        bw.write_ue(0); // pic_parameter_set_id
        bw.write_bits(self.frame_num, FRAME_NUM_BITS);
        if idr {
            bw.write_ue(self.idr_pic_id);
            // dec_ref_pic_marking: no_output_of_prior_pics, long_term_reference
            bw.write_flag(false);
            bw.write_flag(false);
        } else {
            // adaptive_ref_pic_marking_mode_flag
            bw.write_flag(false);
        }
        bw.write_se(0); // slice_qp_delta
        bw.write_ue(1); // disable_deblocking_filter_idc

        let mut block = [0u8; 384];
        for mb_y in 0..self.mb_height {
            for mb_x in 0..self.mb_width {
                bw.write_ue(MB_TYPE_I_PCM);
                bw.align_to_byte(); // pcm_alignment_zero_bit
                fill_macroblock(picture, mb_x as usize, mb_y as usize, &mut block);
                bw.write_bytes(&block);
            }
        }
        bw.write_trailing_bits();

        if idr {
            self.push_unit(NalUnitType::SliceIdr, 3, &bw.finish());
        } else {
            self.push_unit(NalUnitType::Slice, 2, &bw.finish());
        }
    }

    fn push_unit(&mut self, nal_type: NalUnitType, ref_idc: u8, rbsp: &[u8]) {
        let start = self.stream.len();
        write_nal_unit(&mut self.stream, nal_type, ref_idc, rbsp);
        self.units.push(start..self.stream.len());
    }
}

/// 取出一个宏块的 256 个亮度采样 + 64 Cb + 64 Cr, 越界部分复制边缘像素
///
/// PCM 采样值 0 在早期解码器中非法, 统一抬到 1.
fn fill_macroblock(picture: &I420Image, mb_x: usize, mb_y: usize, block: &mut [u8; 384]) {
    let w = picture.width() as usize;
    let h = picture.height() as usize;
    let cw = picture.chroma_width();
    let ch = picture.chroma_height();

    let (luma, chroma) = block.split_at_mut(256);
    copy_block(picture.y(), w, h, mb_x * 16, mb_y * 16, 16, luma);
    let (cb, cr) = chroma.split_at_mut(64);
    copy_block(picture.u(), cw, ch, mb_x * 8, mb_y * 8, 8, cb);
    copy_block(picture.v(), cw, ch, mb_x * 8, mb_y * 8, 8, cr);
}

fn copy_block(
    plane: &[u8],
    stride: usize,
    rows: usize,
    x0: usize,
    y0: usize,
    size: usize,
    out: &mut [u8],
) {
    for dy in 0..size {
        let row = (y0 + dy).min(rows - 1);
        for dx in 0..size {
            let col = (x0 + dx).min(stride - 1);
            out[dy * size + dx] = plane[row * stride + col].max(1);
        }
    }
}

impl NalEngine for IntraPcmEngine {
    fn open(config: &NalConfig) -> VtxResult<Self> {
        if config.codec != NalCodec::H264 {
            return Err(VtxError::Unsupported(
                "帧内 PCM 引擎只支持 H.264 输出".into(),
            ));
        }
        if config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(VtxError::InvalidArgument(format!(
                "帧内 PCM 引擎要求偶数分辨率: {}x{}",
                config.width, config.height
            )));
        }
        if config.rate_control != RateControl::Default {
            debug!(
                "帧内 PCM 引擎不做量化, 忽略码率控制 {:?}",
                config.rate_control
            );
        }
        let mb_width = config.width.div_ceil(16);
        let mb_height = config.height.div_ceil(16);
        Ok(Self {
            width: config.width,
            height: config.height,
            mb_width,
            mb_height,
            gop: config.gop.unwrap_or(DEFAULT_GOP),
            frame_num: 0,
            idr_pic_id: 0,
            stream: Vec::new(),
            units: Vec::with_capacity(3),
        })
    }

    fn name(&self) -> &str {
        "h264-pcm"
    }

    fn encode(&mut self, picture: &I420Image, pts: i64) -> VtxResult<Vec<&[u8]>> {
        if picture.width() != self.width || picture.height() != self.height {
            return Err(VtxError::InvalidArgument(format!(
                "图像尺寸 {}x{} 与会话 {}x{} 不一致",
                picture.width(),
                picture.height(),
                self.width,
                self.height
            )));
        }

        self.stream.clear();
        self.units.clear();

        let idr = pts.rem_euclid(i64::from(self.gop)) == 0;
        if idr {
            self.frame_num = 0;
            self.write_sps();
            self.write_pps();
        }
        self.write_slice(picture, idr);

        if idr {
            self.idr_pic_id ^= 1;
        }
        self.frame_num = (self.frame_num + 1) % (1 << FRAME_NUM_BITS);

        Ok(self
            .units
            .iter()
            .map(|range| &self.stream[range.clone()])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::h264::split_annex_b;
    use vtx_core::FourCc;
    use vtx_core::bitreader::BitReader;

    use crate::descriptor::{CodecDescriptor, CodecOptions, OPT_GOP};

    fn config(w: u32, h: u32, gop: &str) -> NalConfig {
        let opts: CodecOptions = [(OPT_GOP, gop)].into_iter().collect();
        let desc = CodecDescriptor::new(FourCc::YU12, FourCc::H264, w, h).with_options(opts);
        NalConfig::from_descriptor(&desc, 0).unwrap()
    }

    #[test]
    fn test_idr_前输出参数集() {
        let mut engine = IntraPcmEngine::open(&config(32, 32, "3")).unwrap();
        let picture = I420Image::new(32, 32);

        let counts: Vec<usize> = (0..4)
            .map(|pts| engine.encode(&picture, pts).unwrap().len())
            .collect();
        assert_eq!(counts, vec![3, 1, 1, 3]);

        let units: Vec<Vec<u8>> = engine
            .encode(&picture, 6)
            .unwrap()
            .iter()
            .map(|u| u.to_vec())
            .collect();
        let types: Vec<NalUnitType> = units
            .iter()
            .flat_map(|u| split_annex_b(u))
            .map(|n| n.nal_type)
            .collect();
        assert_eq!(
            types,
            vec![NalUnitType::Sps, NalUnitType::Pps, NalUnitType::SliceIdr]
        );
    }

    #[test]
    fn test_sps_字段() {
        let mut engine = IntraPcmEngine::open(&config(40, 20, "10")).unwrap();
        let picture = I420Image::new(40, 20);
        let units = engine.encode(&picture, 0).unwrap();
        let sps = &split_annex_b(units[0])[0];
        let rbsp = sps.rbsp();

        let mut br = BitReader::new(&rbsp);
        assert_eq!(br.read_bits(8).unwrap(), 66);
        br.skip_bits(8).unwrap();
        assert_eq!(br.read_bits(8).unwrap(), 51);
        assert_eq!(br.read_ue().unwrap(), 0); // sps id
        assert_eq!(br.read_ue().unwrap(), 0); // log2_max_frame_num_minus4
        assert_eq!(br.read_ue().unwrap(), 2); // poc type
        assert_eq!(br.read_ue().unwrap(), 1); // max refs
        assert_eq!(br.read_bit().unwrap(), 0);
        assert_eq!(br.read_ue().unwrap() + 1, 3); // 40 → 3 MB
        assert_eq!(br.read_ue().unwrap() + 1, 2); // 20 → 2 MB
        assert_eq!(br.read_bit().unwrap(), 1);
        assert_eq!(br.read_bit().unwrap(), 1);
        assert_eq!(br.read_bit().unwrap(), 1); // cropping
        assert_eq!(br.read_ue().unwrap(), 0);
        assert_eq!(br.read_ue().unwrap(), 4); // (48 - 40) / 2
        assert_eq!(br.read_ue().unwrap(), 0);
        assert_eq!(br.read_ue().unwrap(), 6); // (32 - 20) / 2
    }

    #[test]
    fn test_pcm_采样不含零() {
        let mut engine = IntraPcmEngine::open(&config(16, 16, "1")).unwrap();
        let mut picture = I420Image::new(16, 16);
        let (y, _, _) = picture.planes_mut();
        y.fill(0);
        let units = engine.encode(&picture, 0).unwrap();
        let slice = &split_annex_b(units[2])[0];
        let rbsp = slice.rbsp();
        // 切片头之后的 256 字节亮度采样全部为 1
        let luma_start = rbsp.len() - 1 - 384;
        assert!(rbsp[luma_start..luma_start + 256].iter().all(|&b| b == 1));
        assert_eq!(*rbsp.last().unwrap(), 0x80);
    }

    #[test]
    fn test_奇数分辨率被拒绝() {
        assert!(matches!(
            IntraPcmEngine::open(&config(33, 32, "1")),
            Err(VtxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_hevc_被拒绝() {
        let desc = CodecDescriptor::new(FourCc::YU12, FourCc::HEVC, 16, 16);
        let cfg = NalConfig::from_descriptor(&desc, 0).unwrap();
        assert!(matches!(
            IntraPcmEngine::open(&cfg),
            Err(VtxError::Unsupported(_))
        ));
    }
}
