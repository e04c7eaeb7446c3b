//! # vtx-core
//!
//! vtx 视频转码核心库, 提供格式码、错误类型、像素布局、比特流工具,
//! 以及采集源/输出端抽象.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod fourcc;
pub mod io;
pub mod pixel_format;

// 重导出常用类型
pub use error::{VtxError, VtxResult};
pub use fourcc::FourCc;
pub use io::{FrameSink, FrameSource, MemorySink, MemorySource, Readiness};
pub use pixel_format::PixelFormat;
