//! # 服务端与轮询配置
//!
//! 默认值对应参考行为：每 1000ms 查询一次，不设次数与总时长上限。
//! 上限是可选项，由调用方按需开启。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::JobError;

/// 任务服务端连接配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务端根地址，例如 `http://127.0.0.1:8000`。
    pub base_url: String,
    /// 单次请求总超时（秒），包含上传。
    pub request_timeout_secs: u64,
    /// 建立连接超时（秒）。
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 8,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), JobError> {
        if self.base_url.trim().is_empty() {
            return Err(JobError::Config("base_url 不能为空".to_string()));
        }
        if !(1..=600).contains(&self.request_timeout_secs) {
            return Err(JobError::Config(
                "request_timeout_secs 必须在 1~600 秒之间".to_string(),
            ));
        }
        if !(1..=120).contains(&self.connect_timeout_secs) {
            return Err(JobError::Config(
                "connect_timeout_secs 必须在 1~120 秒之间".to_string(),
            ));
        }
        if self.connect_timeout_secs > self.request_timeout_secs {
            return Err(JobError::Config(
                "connect_timeout_secs 不能大于 request_timeout_secs".to_string(),
            ));
        }
        Ok(())
    }
}

/// 轮询配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// 两次查询之间的间隔（毫秒）。
    pub interval_ms: u64,
    /// 最多查询次数；`None` 表示不限。
    pub max_attempts: Option<u32>,
    /// 从开始轮询起的总时长上限（秒）；`None` 表示不限。
    pub timeout_secs: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: None,
            timeout_secs: None,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<(), JobError> {
        if !(50..=60_000).contains(&self.interval_ms) {
            return Err(JobError::Config(
                "interval_ms 必须在 50~60000 毫秒之间".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(JobError::Config("max_attempts 至少为 1".to_string()));
        }
        if self.timeout_secs == Some(0) {
            return Err(JobError::Config("timeout_secs 至少为 1".to_string()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_unbounded() {
        let poll = PollConfig::default();
        assert!(poll.validate().is_ok());
        assert_eq!(poll.interval(), Duration::from_secs(1));
        assert_eq!(poll.max_attempts, None);
        assert_eq!(poll.timeout(), None);
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn poll_bounds_must_be_positive() {
        let poll = PollConfig {
            max_attempts: Some(0),
            ..PollConfig::default()
        };
        assert!(matches!(poll.validate(), Err(JobError::Config(_))));

        let poll = PollConfig {
            interval_ms: 10,
            ..PollConfig::default()
        };
        assert!(poll.validate().is_err());
    }

    #[test]
    fn connect_timeout_cannot_exceed_request_timeout() {
        let server = ServerConfig {
            request_timeout_secs: 5,
            connect_timeout_secs: 10,
            ..ServerConfig::default()
        };
        assert!(server.validate().is_err());
    }
}
