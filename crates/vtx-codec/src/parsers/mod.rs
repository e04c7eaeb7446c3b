//! 码流解析与封装工具.

pub mod h264;
