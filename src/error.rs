//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 各阶段有自己的错误类型（`ImagePrepError` / `JobError`），
//! 应用层用 `AppError` 汇总，命令行入口只处理这一种错误。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为阶段错误与 `std::io::Error` 提供 `From` 转换，`?` 直接上抛。
//! - `code()` 给出稳定错误码，日志与退出信息都使用它。

use crate::image_prep::ImagePrepError;
use crate::job::JobError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 配置文件或命令行参数不合法
    #[error("配置错误: {0}")]
    Config(String),

    /// 读取源图片失败（预处理本身不会产生错误）
    #[error("{0}")]
    Image(#[from] ImagePrepError),

    /// 参数、提交、轮询或任务本身失败
    #[error("{0}")]
    Job(#[from] JobError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 结果下载失败
    #[error("结果下载失败: {0}")]
    Download(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E_CONFIG",
            Self::Image(err) => err.code(),
            Self::Job(err) => err.code(),
            Self::Io(_) => "E_IO",
            Self::Download(_) => "E_DOWNLOAD",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_errors_keep_their_codes() {
        let err: AppError = JobError::JobFailed("bad input".into()).into();
        assert_eq!(err.code(), "E_JOB_FAILED");
        assert_eq!(err.to_string(), "bad input");

        let err: AppError = ImagePrepError::FileSystem("missing".into()).into();
        assert_eq!(err.code(), "E_FILE");
    }

    #[test]
    fn io_errors_convert() {
        let err: AppError = std::io::Error::other("disk full").into();
        assert_eq!(err.code(), "E_IO");
        assert!(err.to_string().contains("disk full"));
    }
}
