//! # 源文件加载
//!
//! 存在性 + metadata 体积限制 + 读取。先查 metadata 再读文件，超限尽快失败。

use std::path::Path;

use super::{ImagePrepError, SourceImage};

impl SourceImage {
    /// 从本地路径读取源图片。
    ///
    /// 只做体积限制，不校验是否为图片：无法解码的文件会在预处理阶段原样回退上传，
    /// 由服务端判定。
    pub fn load(path: impl AsRef<Path>, max_file_size: u64) -> Result<Self, ImagePrepError> {
        let file_path = path.as_ref();
        log::info!("📁 读取源图片 - 路径: {}", file_path.display());

        if !file_path.exists() {
            return Err(ImagePrepError::FileSystem(format!(
                "文件不存在：{}",
                file_path.display()
            )));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| ImagePrepError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if !metadata.is_file() {
            return Err(ImagePrepError::FileSystem(format!(
                "不是普通文件：{}",
                file_path.display()
            )));
        }

        if metadata.len() > max_file_size {
            return Err(ImagePrepError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| ImagePrepError::FileSystem(format!("无法读取图片文件：{}", e)))?;

        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let source = Self::from_bytes(bytes, file_name);
        if !source.media_type().starts_with("image/") {
            log::warn!(
                "⚠️ 源文件签名不是图片类型：{}，将尝试按原样上传",
                source.media_type()
            );
        }

        Ok(source)
    }
}
