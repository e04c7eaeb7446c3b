//! 四字符格式码 (FourCC).
//!
//! V4L2 用 32 位整数标识像素格式与压缩格式, 四个 ASCII 字符按小端序打包:
//! `v4l2_fourcc(a, b, c, d) = a | b << 8 | c << 16 | d << 24`.
//!
//! 值 0 保留为通配键 ([`FourCc::ANY`]), 在注册表中表示"无精确匹配时的默认处理器".

use std::fmt;
use std::str::FromStr;

use crate::{VtxError, VtxResult};

/// 格式标识 (FourCC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCc(u32);

impl FourCc {
    /// 通配键, 注册表回退项
    pub const ANY: FourCc = FourCc(0);

    // 打包 YUV
    pub const YUYV: FourCc = FourCc::new(*b"YUYV");
    pub const UYVY: FourCc = FourCc::new(*b"UYVY");

    // 平面 / 半平面 YUV 4:2:0
    pub const YU12: FourCc = FourCc::new(*b"YU12");
    pub const YV12: FourCc = FourCc::new(*b"YV12");
    pub const NV12: FourCc = FourCc::new(*b"NV12");
    pub const NV21: FourCc = FourCc::new(*b"NV21");

    // RGB
    pub const RGB3: FourCc = FourCc::new(*b"RGB3");
    pub const BGR3: FourCc = FourCc::new(*b"BGR3");
    /// 32 位, 内存顺序 B G R A
    pub const AR24: FourCc = FourCc::new(*b"AR24");
    /// 32 位, 内存顺序 R G B A
    pub const AB24: FourCc = FourCc::new(*b"AB24");
    pub const GREY: FourCc = FourCc::new(*b"GREY");

    // 压缩格式
    pub const MJPG: FourCc = FourCc::new(*b"MJPG");
    pub const JPEG: FourCc = FourCc::new(*b"JPEG");
    pub const VP80: FourCc = FourCc::new(*b"VP80");
    pub const VP90: FourCc = FourCc::new(*b"VP90");
    pub const H264: FourCc = FourCc::new(*b"H264");
    pub const HEVC: FourCc = FourCc::new(*b"HEVC");

    /// I420 是 YU12 的常用别名
    pub const I420: FourCc = FourCc::YU12;

    /// 由四个 ASCII 字节构造
    pub const fn new(code: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(code))
    }

    /// 原始 32 位值
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// 四个字节 (小端序)
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// 是否为通配键
    pub const fn is_any(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for FourCc {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<FourCc> for u32 {
    fn from(value: FourCc) -> Self {
        value.0
    }
}

impl From<[u8; 4]> for FourCc {
    fn from(code: [u8; 4]) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return write!(f, "*");
        }
        for b in self.to_bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for FourCc {
    type Err = VtxError;

    /// 解析四字符码, 不足四位时以空格补齐 (与 V4L2 工具行为一致)
    fn from_str(s: &str) -> VtxResult<Self> {
        let bytes = s.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 || !s.is_ascii() {
            return Err(VtxError::InvalidArgument(format!(
                "无效的 FourCC: '{s}', 需要 1-4 个 ASCII 字符"
            )));
        }
        let mut code = [b' '; 4];
        code[..bytes.len()].copy_from_slice(bytes);
        Ok(Self::new(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_小端序打包() {
        assert_eq!(FourCc::VP80.as_u32(), 0x3038_5056);
        assert_eq!(FourCc::H264.to_bytes(), *b"H264");
    }

    #[test]
    fn test_字符串解析与显示() {
        let f: FourCc = "MJPG".parse().unwrap();
        assert_eq!(f, FourCc::MJPG);
        assert_eq!(f.to_string(), "MJPG");
        assert_eq!(FourCc::ANY.to_string(), "*");
    }

    #[test]
    fn test_短码补空格() {
        let f: FourCc = "Y8".parse().unwrap();
        assert_eq!(f.to_bytes(), *b"Y8  ");
    }

    #[test]
    fn test_非法码() {
        assert!("".parse::<FourCc>().is_err());
        assert!("TOOLONG".parse::<FourCc>().is_err());
    }

    #[test]
    fn test_u32_互转() {
        let raw = FourCc::NV12.as_u32();
        assert_eq!(FourCc::from(raw), FourCc::NV12);
        assert_eq!(u32::from(FourCc::NV12), raw);
        assert!(FourCc::from(0).is_any());
    }
}
