//! V4L2 输出端 (例如 v4l2loopback 虚拟摄像头).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use v4l::prelude::*;
use v4l::video::Output as _;
use vtx_core::{FourCc, FrameSink, VtxError, VtxResult};

use crate::{device_error, fourcc_from_v4l, fourcc_to_v4l};

/// V4L2 输出设备
pub struct V4l2Output {
    path: PathBuf,
    file: File,
    width: u32,
    height: u32,
    format: FourCc,
    buffer_size: usize,
}

impl V4l2Output {
    /// 打开输出设备并设置格式, 缓冲区大小取驱动协商的 sizeimage
    pub fn open(path: impl AsRef<Path>, format: FourCc, width: u32, height: u32) -> VtxResult<Self> {
        let path = path.as_ref();
        let device = Device::with_path(path).map_err(|e| device_error(path, "打开设备", e))?;
        let mut fmt = device
            .format()
            .map_err(|e| device_error(path, "查询输出格式", e))?;
        fmt.width = width;
        fmt.height = height;
        fmt.fourcc = fourcc_to_v4l(format);
        let fmt = device
            .set_format(&fmt)
            .map_err(|e| device_error(path, "设置输出格式", e))?;

        let negotiated = fourcc_from_v4l(fmt.fourcc);
        if negotiated != format || fmt.width != width || fmt.height != height {
            return Err(VtxError::Device(format!(
                "{}: 驱动不接受 {format} {width}x{height}, 协商结果 {negotiated} {}x{}",
                path.display(),
                fmt.width,
                fmt.height
            )));
        }

        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| device_error(path, "打开设备文件", e))?;
        info!(
            "输出设备 {}: {format} {width}x{height}, 缓冲区 {} 字节",
            path.display(),
            fmt.size
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            width,
            height,
            format,
            buffer_size: fmt.size as usize,
        })
    }
}

impl FrameSink for V4l2Output {
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
        self.file
            .write(data)
            .inspect_err(|e| warn!("{}: 写入失败: {e}", self.path.display()))
    }
}
