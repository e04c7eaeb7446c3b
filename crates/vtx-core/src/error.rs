//! 统一错误类型定义.
//!
//! 所有 vtx crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// vtx 统一错误类型
#[derive(Debug, Error)]
pub enum VtxError {
    /// 无效参数 (选项值无法解析, 分辨率非法等)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 后端不支持请求的格式或参数
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 编解码器引擎错误
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 设备错误 (打开, 协商格式失败)
    #[error("设备错误: {0}")]
    Device(String),

    /// 已到达流末尾 (位读取器越界)
    #[error("已到达流末尾")]
    Eof,

    /// 注册表中没有匹配的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 无效数据 (帧长度不足, 损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),
}

/// vtx 统一 Result 类型
pub type VtxResult<T> = Result<T, VtxError>;
