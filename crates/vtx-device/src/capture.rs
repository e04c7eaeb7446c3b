//! V4L2 采集端.
//!
//! 两种 I/O 方式:
//! - `Mmap`: 4 个内存映射缓冲区的流式采集. 就绪等待即带超时的出队,
//!   出队的数据暂存到下一次 `read`;
//! - `ReadWrite`: 对设备文件直接 `read(2)`, 就绪等待用 `poll(2)`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture as _;
use vtx_core::{FourCc, FrameSource, Readiness, VtxResult};

use crate::{device_error, fourcc_from_v4l};

/// 流式缓冲区数量
const MMAP_BUFFERS: u32 = 4;

/// 采集 I/O 方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    #[default]
    Mmap,
    ReadWrite,
}

enum Backend {
    Mmap {
        stream: Stream<'static>,
        /// 已出队但尚未被读取的帧
        pending: Vec<u8>,
        has_pending: bool,
    },
    ReadWrite {
        file: File,
    },
}

/// V4L2 采集设备
pub struct V4l2Capture {
    path: PathBuf,
    width: u32,
    height: u32,
    format: FourCc,
    buffer_size: usize,
    backend: Backend,
    // 流要求设备在其整个生命周期内保持打开
    _device: Device,
}

impl V4l2Capture {
    /// 打开采集设备, 沿用设备当前的格式
    pub fn open(path: impl AsRef<Path>, mode: IoMode) -> VtxResult<Self> {
        let path = path.as_ref();
        let device = Device::with_path(path).map_err(|e| device_error(path, "打开设备", e))?;
        let fmt = device
            .format()
            .map_err(|e| device_error(path, "查询格式", e))?;

        let format = fourcc_from_v4l(fmt.fourcc);
        let buffer_size = fmt.size as usize;
        info!(
            "采集设备 {}: {format} {}x{}, 缓冲区 {buffer_size} 字节, {mode:?}",
            path.display(),
            fmt.width,
            fmt.height
        );

        let backend = match mode {
            IoMode::Mmap => {
                let stream = Stream::with_buffers(&device, Type::VideoCapture, MMAP_BUFFERS)
                    .map_err(|e| device_error(path, "创建 mmap 流", e))?;
                Backend::Mmap {
                    stream,
                    pending: Vec::with_capacity(buffer_size),
                    has_pending: false,
                }
            }
            IoMode::ReadWrite => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(|e| device_error(path, "打开设备文件", e))?;
                Backend::ReadWrite { file }
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            width: fmt.width,
            height: fmt.height,
            format,
            buffer_size,
            backend,
            _device: device,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 等待文件描述符可读; 被信号中断按超时处理, 由调用方重新检查停止标志
fn poll_fd(file: &File, timeout: Duration) -> io::Result<Readiness> {
    let mut pfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    // SAFETY: pfd 是有效的单元素数组, 调用期间一直存活
    let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    match ret {
        0 => Ok(Readiness::Timeout),
        n if n > 0 => Ok(Readiness::Ready),
        _ => {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                Ok(Readiness::Timeout)
            } else {
                Err(err)
            }
        }
    }
}

impl FrameSource for V4l2Capture {
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

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<Readiness> {
        match &mut self.backend {
            Backend::ReadWrite { file } => poll_fd(file, timeout),
            Backend::Mmap {
                stream,
                pending,
                has_pending,
            } => {
                if *has_pending {
                    return Ok(Readiness::Ready);
                }
                stream.set_timeout(timeout);
                match stream.next() {
                    Ok((buf, meta)) => {
                        let used = (meta.bytesused as usize).min(buf.len());
                        pending.clear();
                        pending.extend_from_slice(&buf[..used]);
                        *has_pending = true;
                        Ok(Readiness::Ready)
                    }
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Readiness::Timeout),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Readiness::Timeout),
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.backend {
            Backend::ReadWrite { file } => file.read(buf),
            Backend::Mmap {
                stream,
                pending,
                has_pending,
            } => {
                if !*has_pending {
                    // 未经就绪等待直接读取时同步出队一帧
                    let (data, meta) = stream.next()?;
                    let used = (meta.bytesused as usize).min(data.len());
                    pending.clear();
                    pending.extend_from_slice(&data[..used]);
                }
                *has_pending = false;
                let n = pending.len().min(buf.len());
                if n < pending.len() {
                    debug!(
                        "{}: 帧 {} 字节大于读缓冲区 {}, 截断",
                        self.path.display(),
                        pending.len(),
                        buf.len()
                    );
                }
                buf[..n].copy_from_slice(&pending[..n]);
                Ok(n)
            }
        }
    }
}
