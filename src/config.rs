//! # 客户端配置
//!
//! ## 实现思路
//!
//! 三层来源，后者覆盖前者：
//!
//! ```text
//! 内置默认值 → JSON 配置文件（可选）→ 环境变量 NANO_IMAGE_SERVER → 命令行参数
//! ```
//!
//! 配置文件中缺失的字段取默认值，只需写出要改的部分：
//!
//! ```json
//! { "server": { "base_url": "http://10.0.0.5:8000" }, "poll": { "timeout_secs": 300 } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::image_prep::PrepConfig;
use crate::job::{PollConfig, ServerConfig};

/// 覆盖服务端地址的环境变量。
pub const SERVER_ENV: &str = "NANO_IMAGE_SERVER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub poll: PollConfig,
    pub prep: PrepConfig,
}

impl ClientConfig {
    /// 读取配置：文件（若给出）+ 环境变量覆盖，并校验。
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = config.with_server_override(std::env::var(SERVER_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("读取配置文件 '{}' 失败: {}", path.display(), e))
        })?;

        let config = serde_json::from_str::<Self>(&content).map_err(|e| {
            AppError::Config(format!("解析配置文件 '{}' 失败: {}", path.display(), e))
        })?;

        log::info!("⚙️ 已加载配置文件：{}", path.display());
        Ok(config)
    }

    /// 用非空地址覆盖服务端根地址。
    pub fn with_server_override(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            log::debug!("⚙️ 服务端地址覆盖为 {}", url);
            self.server.base_url = url.trim().to_string();
        }
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.server
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.poll
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        self.prep
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"server":{{"base_url":"http://10.0.0.5:9000"}},"poll":{{"timeout_secs":30}}}}"#
        )
        .expect("write config");

        let config = ClientConfig::from_file(file.path()).expect("load");

        assert_eq!(config.server.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.server.request_timeout_secs, 60);
        assert_eq!(config.poll.timeout_secs, Some(30));
        assert_eq!(config.poll.interval_ms, 1000);
        assert_eq!(config.prep.max_dim, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write");

        assert!(matches!(
            ClientConfig::from_file(file.path()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = ClientConfig::from_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn server_override_ignores_blank_values() {
        let config = ClientConfig::default().with_server_override(Some("  ".into()));
        assert_eq!(config.server.base_url, ServerConfig::default().base_url);

        let config = ClientConfig::default().with_server_override(Some("http://h:1".into()));
        assert_eq!(config.server.base_url, "http://h:1");
    }

    #[test]
    fn invalid_sections_fail_validation() {
        let mut config = ClientConfig::default();
        config.poll.interval_ms = 1;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = ClientConfig::default();
        config.prep.quality = 1.5;
        assert!(config.validate().is_err());
    }
}
