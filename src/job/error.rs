//! # 任务链路错误模型
//!
//! 四类会终结本轮流程的错误，全部带可读消息交给结果展示层：
//!
//! | 变体 | 含义 | 是否发起过网络请求 |
//! |------|------|------|
//! | `InvalidParams` | 参数文本不是 JSON 对象 | 否 |
//! | `Submission` | 提交失败或成功响应缺少 job_id | 是 |
//! | `Query` | 轮询时传输失败，客户端失去观测能力 | 是 |
//! | `JobFailed` | 服务端明确报告任务失败（原文透传） | 是 |
//!
//! `Deadline` 仅在配置了轮询上限时出现；`Config` 为客户端构建错误。

/// 任务提交与轮询统一错误类型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("参数必须是 JSON 对象：{0}")]
    InvalidParams(String),

    #[error("创建任务失败：{0}")]
    Submission(String),

    #[error("查询失败：{0}")]
    Query(String),

    #[error("{0}")]
    JobFailed(String),

    #[error("轮询超出限制：{0}")]
    Deadline(String),

    #[error("客户端配置错误：{0}")]
    Config(String),
}

impl JobError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams(_) => "E_INVALID_PARAMS",
            Self::Submission(_) => "E_SUBMISSION",
            Self::Query(_) => "E_QUERY",
            Self::JobFailed(_) => "E_JOB_FAILED",
            Self::Deadline(_) => "E_DEADLINE",
            Self::Config(_) => "E_CONFIG",
        }
    }

    /// 出错所在阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidParams(_) => "params",
            Self::Submission(_) => "submit",
            Self::Query(_) | Self::Deadline(_) => "poll",
            Self::JobFailed(_) => "job",
            Self::Config(_) => "config",
        }
    }
}
