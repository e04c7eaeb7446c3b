//! # vtx-device
//!
//! V4L2 设备层. 采集设备实现 [`vtx_core::FrameSource`], 输出设备与普通文件
//! 实现 [`vtx_core::FrameSink`], 泵循环只依赖这两个 trait.

pub mod capture;
pub mod file;
pub mod output;

pub use capture::{IoMode, V4l2Capture};
pub use file::FileSink;
pub use output::V4l2Output;

use std::io;
use std::path::Path;

use vtx_core::{FourCc, VtxError};

/// 设备错误附带路径
pub(crate) fn device_error(path: &Path, what: &str, err: io::Error) -> VtxError {
    VtxError::Device(format!("{}: {what}失败: {err}", path.display()))
}

/// v4l 格式码转换
pub(crate) fn fourcc_from_v4l(fourcc: v4l::FourCC) -> FourCc {
    FourCc::new(fourcc.repr)
}

pub(crate) fn fourcc_to_v4l(fourcc: FourCc) -> v4l::FourCC {
    v4l::FourCC::new(&fourcc.to_bytes())
}

/// 路径是否指向字符设备
pub fn is_char_device(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    std::fs::metadata(path)
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_互转() {
        let v = fourcc_to_v4l(FourCc::YUYV);
        assert_eq!(&v.repr, b"YUYV");
        assert_eq!(fourcc_from_v4l(v), FourCc::YUYV);
    }

    #[test]
    fn test_普通文件不是字符设备() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(!is_char_device(file.path()));
        assert!(!is_char_device(Path::new("/nonexistent/vtx")));
    }
}
