//! # 任务服务端抽象
//!
//! 核心只依赖两个端点：提交与状态查询。抽象成 trait 后，
//! 轮询状态机可以用脚本化的假服务端测试，HTTP 细节留在 `http` 模块。

use async_trait::async_trait;

use super::{JobError, JobHandle, JobRequest, JobStatus};

#[async_trait]
pub trait JobApi: Send + Sync {
    /// 提交一次任务。只发一次请求，不重试。
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle, JobError>;

    /// 查询一次任务状态。传输失败或非成功响应返回 `JobError::Query`。
    async fn fetch_status(&self, job: &JobHandle) -> Result<JobStatus, JobError>;
}
