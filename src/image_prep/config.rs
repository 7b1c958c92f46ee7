//! # 预处理配置
//!
//! ## 设计思路
//!
//! 将上传前压缩的“可调策略”集中到 `PrepConfig`。
//! 档位（quality / balanced / speed）作为高层语义，映射到最长边、JPEG 质量与缩放滤镜。
//! `balanced` 即默认值：最长边 1024、质量 0.85。

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::ImagePrepError;

/// 预处理配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    /// 输出图片最长边上限（像素）。源图更小时不放大。
    pub max_dim: u32,
    /// JPEG 重新编码质量（0~1）。
    pub quality: f32,
    /// 缩放滤镜。
    #[serde(with = "filter_name")]
    pub resize_filter: FilterType,
    /// 读取源文件允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`），超过则直接按原图上传。
    ///
    /// 默认 1.2 亿像素，覆盖 48/50/108MP 手机原图；解码峰值内存约为像素数的 3~4 倍字节。
    pub max_decoded_pixels: u64,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            max_dim: 1024,
            quality: 0.85,
            resize_filter: FilterType::Triangle,
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 120_000_000,
        }
    }
}

impl PrepConfig {
    /// 校验取值范围。
    pub fn validate(&self) -> Result<(), ImagePrepError> {
        if !(16..=16_384).contains(&self.max_dim) {
            return Err(ImagePrepError::InvalidFormat(
                "max_dim 必须在 16~16384 之间".to_string(),
            ));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(ImagePrepError::InvalidFormat(
                "quality 必须在 (0, 1] 之间".to_string(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(ImagePrepError::InvalidFormat(
                "max_file_size 不能为 0".to_string(),
            ));
        }
        if self.max_decoded_pixels == 0 {
            return Err(ImagePrepError::InvalidFormat(
                "max_decoded_pixels 不能为 0".to_string(),
            ));
        }
        Ok(())
    }

    /// JPEG 编码器使用的 1~100 质量值。
    pub(crate) fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// 应用指定档位。
    pub fn apply_profile(&mut self, profile: PrepProfile) {
        match profile {
            PrepProfile::Quality => {
                self.max_dim = 2048;
                self.quality = 0.92;
                self.resize_filter = FilterType::CatmullRom;
            }
            PrepProfile::Balanced => {
                self.max_dim = 1024;
                self.quality = 0.85;
                self.resize_filter = FilterType::Triangle;
            }
            PrepProfile::Speed => {
                self.max_dim = 768;
                self.quality = 0.75;
                self.resize_filter = FilterType::Nearest;
            }
        }
    }
}

/// 预处理档位（面向用户语义）。
///
/// - `Quality`：更大尺寸、更高质量，上传体积更大
/// - `Balanced`：默认
/// - `Speed`：更小体积，上传更快
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepProfile {
    Quality,
    Balanced,
    Speed,
}

impl PrepProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use nano_image_client::image_prep::PrepProfile;
    ///
    /// let p = PrepProfile::parse(" Speed ")?;
    /// assert_eq!(p.as_str(), "speed");
    /// # Ok::<(), nano_image_client::image_prep::ImagePrepError>(())
    /// ```
    pub fn parse(profile: &str) -> Result<Self, ImagePrepError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(ImagePrepError::InvalidFormat(format!(
                "未知预处理档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

/// `FilterType` 没有 serde 实现，这里按名称读写。
mod filter_name {
    use image::imageops::FilterType;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(filter: &FilterType, serializer: S) -> Result<S::Ok, S::Error> {
        let name = match filter {
            FilterType::Nearest => "nearest",
            FilterType::Triangle => "triangle",
            FilterType::CatmullRom => "catmull_rom",
            FilterType::Gaussian => "gaussian",
            FilterType::Lanczos3 => "lanczos3",
        };
        serializer.serialize_str(name)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FilterType, D::Error> {
        let name = String::deserialize(deserializer)?;
        match name.trim().to_lowercase().as_str() {
            "nearest" => Ok(FilterType::Nearest),
            "triangle" => Ok(FilterType::Triangle),
            "catmull_rom" | "catmullrom" => Ok(FilterType::CatmullRom),
            "gaussian" => Ok(FilterType::Gaussian),
            "lanczos3" => Ok(FilterType::Lanczos3),
            other => Err(serde::de::Error::custom(format!("未知缩放滤镜：{}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_balanced_profile() {
        let mut config = PrepConfig::default();
        let before = (config.max_dim, config.quality);
        config.apply_profile(PrepProfile::Balanced);
        assert_eq!(before, (config.max_dim, config.quality));
        assert_eq!(config.jpeg_quality(), 85);
    }

    #[test]
    fn profile_parse_rejects_unknown() {
        assert!(matches!(
            PrepProfile::parse("ultra"),
            Err(ImagePrepError::InvalidFormat(_))
        ));
        assert_eq!(PrepProfile::parse("QUALITY").expect("parse"), PrepProfile::Quality);
    }

    #[test]
    fn validate_rejects_out_of_range_quality() {
        let mut config = PrepConfig::default();
        config.quality = 0.0;
        assert!(config.validate().is_err());
        config.quality = 1.5;
        assert!(config.validate().is_err());
        config.quality = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn filter_roundtrips_through_json() {
        let mut config = PrepConfig::default();
        config.resize_filter = FilterType::Lanczos3;
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(json.contains("\"lanczos3\""));

        let parsed: PrepConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.resize_filter, FilterType::Lanczos3);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let parsed: PrepConfig = serde_json::from_str(r#"{"max_dim": 512}"#).expect("deserialize");
        assert_eq!(parsed.max_dim, 512);
        assert_eq!(parsed.jpeg_quality(), 85);
    }
}
