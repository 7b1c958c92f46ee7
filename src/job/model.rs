//! # 任务数据模型
//!
//! 线上协议（JSON）：
//!
//! ```text
//! POST /api/jobs        multipart{type, params, file} → {"job_id": "..."}
//! GET  /api/jobs/{id}   → {"id", "status", "progress", "results", "error"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::image_prep::PreprocessedImage;

/// 一次提交请求。
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// 要执行的变换（如 `enhance`）。合法集合由服务端决定，这里不校验。
    pub feature_type: String,
    pub params: Map<String, Value>,
    pub image: PreprocessedImage,
}

impl JobRequest {
    pub fn new(feature_type: impl Into<String>, params: Map<String, Value>, image: PreprocessedImage) -> Self {
        Self {
            feature_type: feature_type.into(),
            params,
            image,
        }
    }

    /// 序列化后的参数文本，作为 multipart 的 `params` 字段。
    pub fn params_json(&self) -> String {
        Value::Object(self.params.clone()).to_string()
    }
}

/// 服务端签发的任务句柄。每次成功提交创建一次，不复用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: String,
}

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// 服务端任务状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// 排队中（服务端可能写作 `pending`）。
    #[serde(alias = "pending")]
    Queued,
    Running,
    Finished,
    Failed,
    /// 无法识别的状态字符串，按非终态处理。
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

/// 单次轮询得到的状态快照。每次都是新值，不与上一次合并。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    /// 0~100。
    pub progress: u8,
    pub state: JobState,
    /// 仅在 `finished` 时有意义。
    pub results: Vec<String>,
    /// 仅在 `failed` 时有意义。
    pub error: Option<String>,
}

impl JobStatus {
    pub fn new(progress: u8, state: JobState) -> Self {
        Self {
            progress: progress.min(100),
            state,
            results: Vec::new(),
            error: None,
        }
    }

    pub fn finished(results: Vec<String>) -> Self {
        Self {
            results,
            ..Self::new(100, JobState::Finished)
        }
    }

    pub fn failed(progress: u8, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(progress, JobState::Failed)
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateJobResponse {
    #[serde(default)]
    pub(crate) job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    status: JobState,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    results: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

impl From<StatusResponse> for JobStatus {
    fn from(raw: StatusResponse) -> Self {
        let progress = raw
            .progress
            .filter(|p| p.is_finite())
            .map(|p| p.round().clamp(0.0, 100.0) as u8)
            .unwrap_or(0);

        Self {
            progress,
            state: raw.status,
            results: raw.results.unwrap_or_default(),
            error: raw.error.filter(|e| !e.trim().is_empty()),
        }
    }
}
