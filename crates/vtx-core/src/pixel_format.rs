//! 原始像素格式布局.
//!
//! 将 V4L2 FourCC 映射为平面布局 (平面数, 行字节数, 行数), 用于计算
//! 采集设备每帧的字节数以及颜色空间转换时的平面切分.
//!
//! 色度平面尺寸向上取整, 奇数分辨率同样可用.

use std::fmt;

use crate::FourCc;

/// 原始像素格式
///
/// 只覆盖未压缩格式. 压缩格式 (MJPG, H264 等) 没有固定帧大小,
/// [`PixelFormat::from_fourcc`] 对它们返回 `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// YUV 4:2:0 平面格式, Y/U/V 顺序 (YU12, 规范中间格式)
    Yuv420p,
    /// YUV 4:2:0 平面格式, Y/V/U 顺序 (YV12)
    Yvu420p,
    /// NV12: Y 平面 + UV 交错
    Nv12,
    /// NV21: Y 平面 + VU 交错
    Nv21,
    /// YUYV 打包 4:2:2
    Yuyv,
    /// UYVY 打包 4:2:2
    Uyvy,
    /// RGB 各 8 位, 打包
    Rgb24,
    /// BGR 各 8 位, 打包
    Bgr24,
    /// RGBA 各 8 位, 打包
    Rgba,
    /// BGRA 各 8 位, 打包
    Bgra,
    /// 灰度 8 位
    Gray8,
}

impl PixelFormat {
    /// 由 FourCC 查找原始格式
    pub fn from_fourcc(fourcc: FourCc) -> Option<Self> {
        Some(match fourcc {
            FourCc::YU12 => Self::Yuv420p,
            FourCc::YV12 => Self::Yvu420p,
            FourCc::NV12 => Self::Nv12,
            FourCc::NV21 => Self::Nv21,
            FourCc::YUYV => Self::Yuyv,
            FourCc::UYVY => Self::Uyvy,
            FourCc::RGB3 => Self::Rgb24,
            FourCc::BGR3 => Self::Bgr24,
            FourCc::AB24 => Self::Rgba,
            FourCc::AR24 => Self::Bgra,
            FourCc::GREY => Self::Gray8,
            _ => return None,
        })
    }

    /// 对应的 FourCC
    pub const fn fourcc(&self) -> FourCc {
        match self {
            Self::Yuv420p => FourCc::YU12,
            Self::Yvu420p => FourCc::YV12,
            Self::Nv12 => FourCc::NV12,
            Self::Nv21 => FourCc::NV21,
            Self::Yuyv => FourCc::YUYV,
            Self::Uyvy => FourCc::UYVY,
            Self::Rgb24 => FourCc::RGB3,
            Self::Bgr24 => FourCc::BGR3,
            Self::Rgba => FourCc::AB24,
            Self::Bgra => FourCc::AR24,
            Self::Gray8 => FourCc::GREY,
        }
    }

    /// 平面数量
    pub const fn plane_count(&self) -> usize {
        match self {
            Self::Yuv420p | Self::Yvu420p => 3,
            Self::Nv12 | Self::Nv21 => 2,
            _ => 1,
        }
    }

    /// 计算指定平面每行的字节数
    ///
    /// 平面索引超出范围时返回 `None`.
    pub fn plane_linesize(&self, plane: usize, width: u32) -> Option<usize> {
        if plane >= self.plane_count() {
            return None;
        }
        let w = width as usize;
        let cw = w.div_ceil(2);
        Some(match self {
            Self::Yuv420p | Self::Yvu420p => {
                if plane == 0 {
                    w
                } else {
                    cw
                }
            }
            // plane1: UV 交错, 每个色度样本 2 字节
            Self::Nv12 | Self::Nv21 => {
                if plane == 0 {
                    w
                } else {
                    cw * 2
                }
            }
            Self::Yuyv | Self::Uyvy => cw * 4,
            Self::Rgb24 | Self::Bgr24 => w * 3,
            Self::Rgba | Self::Bgra => w * 4,
            Self::Gray8 => w,
        })
    }

    /// 计算指定平面的行数
    pub fn plane_height(&self, plane: usize, height: u32) -> Option<usize> {
        if plane >= self.plane_count() {
            return None;
        }
        let h = height as usize;
        Some(match self {
            Self::Yuv420p | Self::Yvu420p | Self::Nv12 | Self::Nv21 if plane > 0 => h.div_ceil(2),
            _ => h,
        })
    }

    /// 计算整帧的字节数
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        (0..self.plane_count())
            .filter_map(|plane| {
                Some(self.plane_linesize(plane, width)? * self.plane_height(plane, height)?)
            })
            .sum()
    }
}

/// 计算 FourCC 格式一帧的字节数, 压缩格式返回 `None`
pub fn frame_size(fourcc: FourCc, width: u32, height: u32) -> Option<usize> {
    PixelFormat::from_fourcc(fourcc).map(|pf| pf.frame_size(width, height))
}

/// 是否为压缩格式 (无固定帧大小)
pub fn is_compressed(fourcc: FourCc) -> bool {
    matches!(
        fourcc,
        FourCc::MJPG | FourCc::JPEG | FourCc::VP80 | FourCc::VP90 | FourCc::H264 | FourCc::HEVC
    )
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yuv420p => "yuv420p",
            Self::Yvu420p => "yvu420p",
            Self::Nv12 => "nv12",
            Self::Nv21 => "nv21",
            Self::Yuyv => "yuyv422",
            Self::Uyvy => "uyvy422",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Gray8 => "gray8",
        };
        write!(f, "{name}")
    }
}
