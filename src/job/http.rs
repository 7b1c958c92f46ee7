//! # HTTP 任务客户端
//!
//! ## 实现思路
//!
//! - 提交：一次 multipart 请求（`type` / `params` 文本字段 + `file` 二进制），不重试。
//! - 查询：`GET /api/jobs/{id}`，非 2xx 视为查询失败。
//! - 复用同一个 `reqwest::Client`，连接池与超时配置一次构建。
//! - 日志中的 URL 去掉 query，避免泄露签名参数。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};

use super::model::{CreateJobResponse, StatusResponse};
use super::{JobApi, JobError, JobHandle, JobRequest, JobStatus, ServerConfig};

const ERROR_BODY_PREVIEW_CHARS: usize = 200;

/// 基于 reqwest 的任务服务端客户端。
#[derive(Debug, Clone)]
pub struct HttpJobApi {
    client: reqwest::Client,
    base_url: Url,
    request_timeout_secs: u64,
}

impl HttpJobApi {
    /// 根据配置创建客户端。
    ///
    /// # 示例
    /// ```rust
    /// use nano_image_client::job::{HttpJobApi, ServerConfig};
    ///
    /// let api = HttpJobApi::new(&ServerConfig::default())?;
    /// assert_eq!(api.base_url().as_str(), "http://127.0.0.1:8000/");
    /// # Ok::<(), nano_image_client::job::JobError>(())
    /// ```
    pub fn new(config: &ServerConfig) -> Result<Self, JobError> {
        config.validate()?;
        let base_url = parse_base_url(&config.base_url)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| JobError::Config(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            client,
            base_url,
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 共享的 HTTP 客户端，供结果下载复用。
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// 服务端健康检查：`GET /health` → `{"status":"ok"}`。
    pub async fn health(&self) -> Result<(), JobError> {
        let url = self.endpoint(&["health"])?;
        log::debug!("🩺 健康检查 - {}", redact_url_for_log(&url));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| JobError::Query(self.describe_reqwest_error(e)))?;

        if !response.status().is_success() {
            return Err(JobError::Query(describe_http_failure(response).await));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| JobError::Query(format!("健康检查响应解析失败：{}", e)))?;

        match body.get("status").and_then(|s| s.as_str()) {
            Some("ok") => Ok(()),
            other => Err(JobError::Query(format!(
                "服务端状态异常：{}",
                other.unwrap_or("<missing>")
            ))),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, JobError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| JobError::Config(format!("base_url 不能作为根地址：{}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// 统一映射 reqwest 错误到可读消息。
    fn describe_reqwest_error(&self, e: reqwest::Error) -> String {
        if e.is_timeout() {
            format!("请求超时（{}秒）", self.request_timeout_secs)
        } else if e.is_connect() {
            format!("无法连接：{}", e.without_url())
        } else {
            format!("请求失败：{}", e.without_url())
        }
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle, JobError> {
        let url = self.endpoint(&["api", "jobs"])?;
        let image = &request.image;

        log::info!(
            "📤 提交任务 - type: {} file: {} ({} bytes, {}) -> {}",
            request.feature_type,
            image.file_name(),
            image.size(),
            image.media_type(),
            redact_url_for_log(&url)
        );

        let file_part = Part::stream_with_length(image.bytes().clone(), image.size())
            .file_name(image.file_name().to_string())
            .mime_str(image.media_type())
            .map_err(|e| JobError::Submission(format!("无效的媒体类型 {}：{}", image.media_type(), e)))?;

        let form = Form::new()
            .text("type", request.feature_type.clone())
            .text("params", request.params_json())
            .part("file", file_part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| JobError::Submission(self.describe_reqwest_error(e)))?;

        if !response.status().is_success() {
            return Err(JobError::Submission(describe_http_failure(response).await));
        }

        let body: CreateJobResponse = response
            .json()
            .await
            .map_err(|e| JobError::Submission(format!("响应解析失败：{}", e)))?;

        let job_id = body
            .job_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| JobError::Submission("响应缺少 job_id".to_string()))?;

        log::info!("🆔 任务已创建 - job_id: {}", job_id);
        Ok(JobHandle::new(job_id))
    }

    async fn fetch_status(&self, job: &JobHandle) -> Result<JobStatus, JobError> {
        let url = self.endpoint(&["api", "jobs", job.id()])?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| JobError::Query(self.describe_reqwest_error(e)))?;

        if !response.status().is_success() {
            return Err(JobError::Query(describe_http_failure(response).await));
        }

        let raw: StatusResponse = response
            .json()
            .await
            .map_err(|e| JobError::Query(format!("状态响应解析失败：{}", e)))?;

        Ok(raw.into())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, JobError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| JobError::Config(format!("base_url 格式错误：{}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(JobError::Config("base_url 仅支持 HTTP/HTTPS".to_string()));
    }

    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// 非成功响应的描述：状态码 + 服务端 `detail`（若有）或正文摘要。
async fn describe_http_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| json.get("detail").cloned())
        .map(|detail| match detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.chars().take(ERROR_BODY_PREVIEW_CHARS).collect())
        });

    match detail {
        Some(detail) => format!("HTTP {} {}：{}", status.as_u16(), status_message(status), detail),
        None => format!("HTTP {} {}", status.as_u16(), status_message(status)),
    }
}

/// 常见 HTTP 状态码本地化文案。
fn status_message(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "请求无效",
        404 => "未找到",
        403 => "访问被拒绝",
        413 => "上传体积过大",
        422 => "参数校验失败",
        500..=599 => "服务器错误",
        _ => "请求失败",
    }
}

pub(crate) fn redact_url_for_log(url: &Url) -> String {
    let host = url.host_str().unwrap_or("<unknown-host>");
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    format!("{}://{}{}{}", url.scheme(), host, port, url.path())
}
