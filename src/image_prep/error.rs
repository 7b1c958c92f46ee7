//! # 预处理错误模型
//!
//! ## 设计思路
//!
//! 加载阶段（读文件）的错误会直接上抛给调用方；
//! 解码 / 缩放 / 重新编码阶段的错误只作为“降级原因”记录在
//! [`PreprocessedImage`](super::PreprocessedImage) 上，永远不会越过预处理边界。

/// 图片加载与预处理统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ImagePrepError {
    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),
}

impl ImagePrepError {
    /// 稳定错误码，供 CLI 输出与日志检索。
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileSystem(_) => "E_FILE",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::InvalidFormat(_) => "E_FORMAT",
            Self::Decode(_) => "E_DECODE",
            Self::Encode(_) => "E_ENCODE",
        }
    }
}
