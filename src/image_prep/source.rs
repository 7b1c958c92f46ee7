//! # 数据源与中间模型
//!
//! - `SourceImage`：用户选择的原始文件，读入后不可变
//! - `PreprocessedImage`：上传载荷；要么是重新编码后的 JPEG，要么原样回退为源文件

use bytes::Bytes;

/// 预处理输出的固定媒体类型。
pub const OUTPUT_MEDIA_TYPE: &str = "image/jpeg";

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";
const FALLBACK_FILE_STEM: &str = "upload";

/// 用户选择的源图片。
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Bytes,
    media_type: String,
    file_name: String,
}

impl SourceImage {
    /// 由内存字节构造；媒体类型按文件签名推断。
    pub fn from_bytes(bytes: impl Into<Bytes>, file_name: impl Into<String>) -> Self {
        let bytes = bytes.into();
        let media_type = infer::get(&bytes)
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string());

        Self {
            bytes,
            media_type,
            file_name: file_name.into(),
        }
    }

    /// 使用调用方声明的媒体类型构造。
    pub fn with_media_type(
        bytes: impl Into<Bytes>,
        media_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// 字节大小。
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// 重新编码后使用的文件名：保留主干，扩展名换成 `.jpg`。
    pub(crate) fn output_file_name(&self) -> String {
        let name = self.file_name.trim();
        let stem = match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        };
        let stem = if stem.is_empty() { FALLBACK_FILE_STEM } else { stem };
        format!("{}.jpg", stem)
    }
}

/// 预处理结果，即最终上传的图片。
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    bytes: Bytes,
    media_type: String,
    file_name: String,
    dimensions: Option<(u32, u32)>,
    degraded: Option<String>,
}

impl PreprocessedImage {
    pub(crate) fn reencoded(bytes: Vec<u8>, file_name: String, width: u32, height: u32) -> Self {
        Self {
            bytes: Bytes::from(bytes),
            media_type: OUTPUT_MEDIA_TYPE.to_string(),
            file_name,
            dimensions: Some((width, height)),
            degraded: None,
        }
    }

    /// 回退为原图。`reason` 仅用于日志与诊断。
    pub(crate) fn passthrough(source: &SourceImage, reason: impl Into<String>) -> Self {
        let file_name = if source.file_name.trim().is_empty() {
            FALLBACK_FILE_STEM.to_string()
        } else {
            source.file_name.clone()
        };

        Self {
            bytes: source.bytes.clone(),
            media_type: source.media_type.clone(),
            file_name,
            dimensions: None,
            degraded: Some(reason.into()),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// 重新编码后的宽高；回退为原图时为 `None`。
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn degradation_reason(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    /// 仅当上传体积严格小于源文件时返回 `(原始大小, 上传大小)`。
    pub fn size_reduction(&self, source: &SourceImage) -> Option<(u64, u64)> {
        let (before, after) = (source.size(), self.size());
        (after < before).then_some((before, after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_file_name_replaces_extension() {
        let source = SourceImage::from_bytes(vec![1u8, 2, 3], "holiday.photo.PNG");
        assert_eq!(source.output_file_name(), "holiday.photo.jpg");
    }

    #[test]
    fn output_file_name_falls_back_for_blank_names() {
        assert_eq!(SourceImage::from_bytes(vec![0u8], "").output_file_name(), "upload.jpg");
        assert_eq!(SourceImage::from_bytes(vec![0u8], ".hidden").output_file_name(), ".hidden.jpg");
    }

    #[test]
    fn unknown_bytes_get_octet_stream_type() {
        let source = SourceImage::from_bytes(b"not an image".to_vec(), "a.bin");
        assert_eq!(source.media_type(), "application/octet-stream");
    }

    #[test]
    fn size_reduction_only_reported_when_strictly_smaller() {
        let source = SourceImage::from_bytes(vec![0u8; 10], "a.png");

        let same = PreprocessedImage::passthrough(&source, "test");
        assert_eq!(same.size_reduction(&source), None);

        let bigger = PreprocessedImage::reencoded(vec![0u8; 12], "a.jpg".into(), 1, 1);
        assert_eq!(bigger.size_reduction(&source), None);

        let smaller = PreprocessedImage::reencoded(vec![0u8; 4], "a.jpg".into(), 1, 1);
        assert_eq!(smaller.size_reduction(&source), Some((10, 4)));
    }
}
