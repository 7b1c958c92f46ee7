//! # 图片预处理模块（image_prep）
//!
//! ## 设计思路
//!
//! 上传前把用户图片压缩到有限尺寸与质量，降低带宽占用。
//! 按职责拆分为多个子模块：
//!
//! - `loader`：从本地文件读取源图片（体积限制）
//! - `pipeline`：header 尺寸检查、解码、降采样、JPEG 编码
//! - `preprocessor`：配置快照 + 失败兜底（回退原图）
//! - `config/error/source`：配置、错误、数据模型
//!
//! ```text
//! SourceImage::load（可失败，错误上抛）
//!    ↓
//! ImagePreprocessor::preprocess（永不失败）
//!    ├─ pipeline::reencode 成功 → JPEG
//!    └─ 任何错误            → 原图 + 降级原因
//!    ↓
//! PreprocessedImage（上传载荷）
//! ```

mod config;
mod error;
mod loader;
mod pipeline;
mod preprocessor;
mod source;

pub use config::{PrepConfig, PrepProfile};
pub use error::ImagePrepError;
pub use pipeline::target_dimensions;
pub use preprocessor::{ImagePreprocessor, preprocess};
pub use source::{OUTPUT_MEDIA_TYPE, PreprocessedImage, SourceImage};
