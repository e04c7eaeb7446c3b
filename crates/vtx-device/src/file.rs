//! 文件输出端, 把编码后的码流录制到普通文件.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::debug;
use vtx_core::{FourCc, FrameSink, VtxResult};

use crate::device_error;

/// 文件输出端
///
/// 带缓冲写入, drop 时刷新. 没有驱动缓冲区, `buffer_size` 取一帧原始数据的大小
/// (压缩格式为 0).
pub struct FileSink {
    writer: BufWriter<File>,
    width: u32,
    height: u32,
    format: FourCc,
    buffer_size: usize,
}

impl FileSink {
    /// 创建 (或截断) 文件
    pub fn create(path: impl AsRef<Path>, format: FourCc, width: u32, height: u32) -> VtxResult<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| device_error(path, "创建文件", e))?;
        let buffer_size = vtx_core::pixel_format::frame_size(format, width, height).unwrap_or(0);
        debug!("文件输出 {}: {format} {width}x{height}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            width,
            height,
            format,
            buffer_size,
        })
    }

    /// 刷新缓冲数据
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl FrameSink for FileSink {
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
        self.writer.write_all(data)?;
        Ok(data.len())
    }
}
