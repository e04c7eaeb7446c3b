//! # vtx-scale
//!
//! 像素格式转换库. 所有编码器后端以 I420 (YUV 4:2:0 平面) 为规范中间格式:
//! 采集帧先经 [`to_i420`] 归一化, 原始格式输出再经 [`from_i420`] 还原.

pub mod convert;

pub use convert::{from_i420, is_supported, to_i420};

/// I420 图像 (YUV 4:2:0 平面, 紧密排列无行填充)
///
/// 编解码器实例持有一份作为转换暂存区, 每帧复用.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I420Image {
    width: u32,
    height: u32,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl I420Image {
    /// 创建黑色图像
    pub fn new(width: u32, height: u32) -> Self {
        let luma = width as usize * height as usize;
        let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize;
        Self {
            width,
            height,
            y: vec![16; luma],
            u: vec![128; chroma],
            v: vec![128; chroma],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 色度平面宽度 (向上取整)
    pub fn chroma_width(&self) -> usize {
        self.width.div_ceil(2) as usize
    }

    /// 色度平面高度 (向上取整)
    pub fn chroma_height(&self) -> usize {
        self.height.div_ceil(2) as usize
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    pub fn u(&self) -> &[u8] {
        &self.u
    }

    pub fn v(&self) -> &[u8] {
        &self.v
    }

    /// 同时获取三个平面的可变引用
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        (&mut self.y, &mut self.u, &mut self.v)
    }

    /// 整帧字节数
    pub fn frame_size(&self) -> usize {
        self.y.len() + self.u.len() + self.v.len()
    }

    /// 按 Y/U/V 顺序拼接为连续字节
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.frame_size());
        out.extend_from_slice(&self.y);
        out.extend_from_slice(&self.u);
        out.extend_from_slice(&self.v);
        out
    }
}
