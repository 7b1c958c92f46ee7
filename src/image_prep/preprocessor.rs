//! # 预处理编排
//!
//! ## 设计思路
//!
//! `ImagePreprocessor` 只负责配置管理与失败兜底：
//! 1. 读取配置快照（单次处理内参数不漂移）
//! 2. 调用 `pipeline::reencode`
//! 3. 任何失败都回退为原图，预处理永远不阻塞提交
//!
//! 解码 / 编码是 CPU 密集操作，异步调用方应使用 [`ImagePreprocessor::preprocess_async`]。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::pipeline;
use super::{ImagePrepError, PrepConfig, PrepProfile, PreprocessedImage, SourceImage};

/// 按给定最长边与质量预处理一张图片。
///
/// 永不失败：解码或编码出错时返回原图。参数不做范围校验，
/// `max_dim` 至少取 1，`quality` 收敛到 (0, 1]。
///
/// # 示例
/// ```rust
/// use nano_image_client::image_prep::{preprocess, SourceImage};
///
/// let source = SourceImage::from_bytes(b"not an image".to_vec(), "a.bin");
/// let out = preprocess(&source, 1024, 0.85);
/// assert!(out.is_degraded());
/// assert_eq!(out.bytes(), source.bytes());
/// ```
pub fn preprocess(source: &SourceImage, max_dim: u32, quality: f32) -> PreprocessedImage {
    let config = PrepConfig {
        max_dim: max_dim.max(1),
        quality: clamp_quality(quality),
        ..PrepConfig::default()
    };
    run_with_fallback(source, &config)
}

fn clamp_quality(quality: f32) -> f32 {
    if quality.is_nan() {
        return PrepConfig::default().quality;
    }
    quality.clamp(0.01, 1.0)
}

/// 调用方保证 `config` 已在入口处校验或收敛过。
fn run_with_fallback(source: &SourceImage, config: &PrepConfig) -> PreprocessedImage {
    let start = Instant::now();

    match pipeline::reencode(source, config) {
        Ok(image) => {
            log::debug!("⏱️ 预处理耗时 {}ms", start.elapsed().as_millis());
            image
        }
        Err(err) => {
            log::warn!("⚠️ 预处理失败，按原图上传（{}）：{}", err.code(), err);
            PreprocessedImage::passthrough(source, err.to_string())
        }
    }
}

/// 预处理器。
///
/// 配置通过 `Arc<RwLock<PrepConfig>>` 持有，支持运行时切换档位。
#[derive(Clone)]
pub struct ImagePreprocessor {
    config: Arc<RwLock<PrepConfig>>,
}

impl ImagePreprocessor {
    pub fn new(config: PrepConfig) -> Result<Self, ImagePrepError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 获取配置快照。
    pub fn config_snapshot(&self) -> Result<PrepConfig, ImagePrepError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| ImagePrepError::ResourceLimit("预处理配置读取锁已中毒".to_string()))
    }

    /// 切换预处理档位。
    pub fn set_profile(&self, profile: PrepProfile) -> Result<(), ImagePrepError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| ImagePrepError::ResourceLimit("预处理配置写入锁已中毒".to_string()))?;
        config.apply_profile(profile);

        log::info!(
            "⚙️ 已切换预处理档位：{}（max_dim={}, quality={}, filter={:?}）",
            profile.as_str(),
            config.max_dim,
            config.quality,
            config.resize_filter
        );
        Ok(())
    }

    /// 同步预处理。
    pub fn preprocess(&self, source: &SourceImage) -> PreprocessedImage {
        match self.config_snapshot() {
            Ok(config) => run_with_fallback(source, &config),
            Err(err) => {
                log::warn!("⚠️ 无法读取预处理配置，按原图上传：{}", err);
                PreprocessedImage::passthrough(source, err.to_string())
            }
        }
    }

    /// 在阻塞线程池中预处理，避免占用异步运行时。
    pub async fn preprocess_async(&self, source: SourceImage) -> PreprocessedImage {
        let this = self.clone();
        let fallback = source.clone();

        match tokio::task::spawn_blocking(move || this.preprocess(&source)).await {
            Ok(image) => image,
            Err(err) => {
                log::error!("❌ 预处理线程异常退出，按原图上传：{}", err);
                PreprocessedImage::passthrough(&fallback, format!("预处理线程异常：{}", err))
            }
        }
    }
}
