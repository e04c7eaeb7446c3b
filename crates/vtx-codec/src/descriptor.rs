//! 编解码器描述符与选项.
//!
//! 描述符在建流时由采集/输出设备协商结果和命令行选项生成一次,
//! 在其配置的编解码器实例生命周期内不可变.

use std::collections::BTreeMap;
use std::str::FromStr;

use vtx_core::{FourCc, VtxError, VtxResult};

/// 选项键: 关键帧间隔
pub const OPT_GOP: &str = "GOP";
/// 选项键: 固定码率目标 (kbit/s)
pub const OPT_CBR: &str = "CBR";
/// 选项键: 可变码率目标 (kbit/s)
pub const OPT_VBR: &str = "VBR";
/// 选项键: 固定 QP 码率控制
pub const OPT_RC_CQP: &str = "RC_CQP";
/// 选项键: 恒定质量因子码率控制
pub const OPT_RC_CRF: &str = "RC_CRF";
/// 选项键: JPEG 质量 (0-100)
pub const OPT_QUALITY: &str = "QUALITY";
/// 选项键: JPEG 重启间隔 (MCU 数)
pub const OPT_DRI: &str = "DRI";
/// 选项键: 硬件设备序号
pub const OPT_DEVICE: &str = "DEVICE";
/// 选项键: 硬件编码 profile
pub const OPT_PROFILE: &str = "PROFILE";
/// 选项键: 硬件编码 level
pub const OPT_LEVEL: &str = "LEVEL";
/// 选项键: 硬件编码码率 (kbit/s)
pub const OPT_BITRATE: &str = "BITRATE";

/// 字符串键值选项表
///
/// 解释由各后端负责, 不认识的键直接忽略. 数值解析失败视为构造错误.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecOptions {
    values: BTreeMap<String, String>,
}

impl CodecOptions {
    /// 创建空选项表
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置选项 (覆盖已有值)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// 获取原始字符串值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// 是否包含某个键
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// 按类型解析选项, 键不存在时返回 `Ok(None)`
    pub fn parse<T: FromStr>(&self, key: &str) -> VtxResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                VtxError::InvalidArgument(format!("选项 {key}={raw} 无法解析"))
            }),
        }
    }

    pub fn get_u32(&self, key: &str) -> VtxResult<Option<u32>> {
        self.parse(key)
    }

    pub fn get_i32(&self, key: &str) -> VtxResult<Option<i32>> {
        self.parse(key)
    }

    pub fn get_f32(&self, key: &str) -> VtxResult<Option<f32>> {
        self.parse(key)
    }

    /// 遍历所有选项 (按键排序)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CodecOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// 编解码器描述符
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// 输入 (采集) 格式
    pub input_format: FourCc,
    /// 输出格式
    pub output_format: FourCc,
    /// 帧宽度
    pub width: u32,
    /// 帧高度
    pub height: u32,
    /// 选项
    pub options: CodecOptions,
}

impl CodecDescriptor {
    /// 创建无选项的描述符
    pub fn new(input_format: FourCc, output_format: FourCc, width: u32, height: u32) -> Self {
        Self {
            input_format,
            output_format,
            width,
            height,
            options: CodecOptions::new(),
        }
    }

    /// 替换选项表
    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// 校验分辨率非零
    pub fn check_dimensions(&self) -> VtxResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VtxError::InvalidArgument(format!(
                "无效分辨率: {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_选项解析() {
        let opts: CodecOptions = [(OPT_GOP, "25"), (OPT_RC_CRF, "23.5"), ("UNKNOWN", "x")]
            .into_iter()
            .collect();
        assert_eq!(opts.get_u32(OPT_GOP).unwrap(), Some(25));
        assert_eq!(opts.get_f32(OPT_RC_CRF).unwrap(), Some(23.5));
        assert_eq!(opts.get_u32(OPT_CBR).unwrap(), None);
        assert_eq!(opts.get("UNKNOWN"), Some("x"));
    }

    #[test]
    fn test_非法数值() {
        let mut opts = CodecOptions::new();
        opts.set(OPT_VBR, "fast");
        assert!(matches!(
            opts.get_u32(OPT_VBR),
            Err(VtxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_覆盖写入() {
        let mut opts = CodecOptions::new();
        opts.set(OPT_GOP, "10").set(OPT_GOP, "50");
        assert_eq!(opts.get_i32(OPT_GOP).unwrap(), Some(50));
        assert_eq!(opts.iter().count(), 1);
    }

    #[test]
    fn test_零分辨率() {
        let desc = CodecDescriptor::new(FourCc::YUYV, FourCc::H264, 0, 480);
        assert!(desc.check_dimensions().is_err());
    }
}
