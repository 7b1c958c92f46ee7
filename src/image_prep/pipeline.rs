//! # 解码与重新编码流水线
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → 缩放 → JPEG”的过程集中管理，并在完整解码前先按 header 尺寸做像素上限检查，
//! 降低异常输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸，按像素上限快速拒绝
//! 2. 完整解码
//! 3. 计算目标尺寸：`scale = min(1, max_dim / max(w, h))`，宽高四舍五入
//! 4. 缩放（fast_image_resize，失败回退 `image::resize_exact`）
//! 5. 以固定质量编码为 JPEG（丢弃 alpha 通道）
//!
//! 这里的任何错误都由 [`ImagePreprocessor`](super::ImagePreprocessor) 吞掉并回退为原图。

use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageBuffer, ImageEncoder, Rgb};
use std::io::Cursor;

use super::{ImagePrepError, PrepConfig, PreprocessedImage, SourceImage};

/// 计算目标尺寸。源图更小时保持原尺寸（不放大）。
///
/// 使用四舍五入而不是截断，小比例缩放时宽高比失真更小。
pub fn target_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest == 0 {
        return (width, height);
    }

    let scale = (max_dim as f64 / longest as f64).min(1.0);
    let target_width = ((width as f64 * scale).round() as u32).max(1);
    let target_height = ((height as f64 * scale).round() as u32).max(1);
    (target_width, target_height)
}

/// 执行一次完整的解码 → 缩放 → 编码。
pub(crate) fn reencode(
    source: &SourceImage,
    config: &PrepConfig,
) -> Result<PreprocessedImage, ImagePrepError> {
    let (header_width, header_height) = inspect_dimensions(source.bytes())?;
    validate_pixel_limits(config, header_width, header_height)?;

    let decoded = image::load_from_memory(source.bytes())
        .map_err(|e| ImagePrepError::Decode(format!("图片解码失败：{}", e)))?;

    let (width, height) = decoded.dimensions();
    validate_pixel_limits(config, width, height)?;

    let (target_width, target_height) = target_dimensions(width, height, config.max_dim);
    let resized = if (target_width, target_height) == (width, height) {
        decoded.to_rgb8()
    } else {
        log::debug!(
            "🧩 降采样：{}x{} -> {}x{}（filter={:?}）",
            width,
            height,
            target_width,
            target_height,
            config.resize_filter
        );
        resize_rgb(&decoded, target_width, target_height, config.resize_filter)
    };

    let bytes = encode_jpeg(&resized, config.jpeg_quality())?;

    log::info!(
        "✅ 图片重新编码完成 - 原始尺寸: {}x{} 输出尺寸: {}x{} 体积: {} -> {} bytes",
        width,
        height,
        target_width,
        target_height,
        source.size(),
        bytes.len()
    );

    Ok(PreprocessedImage::reencoded(
        bytes,
        source.output_file_name(),
        target_width,
        target_height,
    ))
}

/// 仅通过图片头信息读取宽高。
fn inspect_dimensions(bytes: &[u8]) -> Result<(u32, u32), ImagePrepError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImagePrepError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| ImagePrepError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(config: &PrepConfig, width: u32, height: u32) -> Result<(), ImagePrepError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ImagePrepError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ImagePrepError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

fn resize_rgb(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
    match resize_with_fast_image_resize(image, target_width, target_height, filter) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}", err);
            image
                .resize_exact(target_width, target_height, filter)
                .to_rgb8()
        }
    }
}

fn resize_with_fast_image_resize(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<ImageBuffer<Rgb<u8>, Vec<u8>>, ImagePrepError> {
    let src = image.to_rgb8();
    let (src_width, src_height) = src.dimensions();

    let src_image =
        fr::images::Image::from_vec_u8(src_width, src_height, src.into_raw(), fr::PixelType::U8x3)
            .map_err(|e| ImagePrepError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ImagePrepError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| ImagePrepError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

fn encode_jpeg(image: &ImageBuffer<Rgb<u8>, Vec<u8>>, quality: u8) -> Result<Vec<u8>, ImagePrepError> {
    let (width, height) = image.dimensions();
    let mut out = Vec::with_capacity((width as usize * height as usize) / 4 + 1024);

    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| ImagePrepError::Encode(format!("JPEG 编码失败：{}", e)))?;

    if out.is_empty() {
        return Err(ImagePrepError::Encode("JPEG 编码输出为空".to_string()));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[test]
    fn target_dimensions_never_upscale() {
        assert_eq!(target_dimensions(640, 480, 1024), (640, 480));
        assert_eq!(target_dimensions(1024, 10, 1024), (1024, 10));
    }

    #[test]
    fn target_dimensions_round_instead_of_truncate() {
        // 3000x1999 -> scale 1024/3000, 1999 * 0.34133 = 682.3 -> 682
        assert_eq!(target_dimensions(3000, 1999, 1024), (1024, 682));
        // 3x2 -> 2x1.333 -> (2, 1)
        assert_eq!(target_dimensions(3, 2, 2), (2, 1));
        // 3x5 -> 1.2x2 -> (1, 2)
        assert_eq!(target_dimensions(3, 5, 2), (1, 2));
    }

    #[test]
    fn target_dimensions_keep_thin_edges_visible() {
        assert_eq!(target_dimensions(10_000, 1, 100), (100, 1));
    }

    #[test]
    fn reencode_downscales_and_outputs_jpeg() {
        let source = SourceImage::from_bytes(create_png_bytes(2048, 1024), "wide.png");
        let config = PrepConfig::default();

        let out = reencode(&source, &config).expect("reencode should succeed");

        assert_eq!(out.dimensions(), Some((1024, 512)));
        assert_eq!(out.media_type(), "image/jpeg");
        assert_eq!(out.file_name(), "wide.jpg");
        assert!(!out.is_degraded());

        let decoded = image::load_from_memory_with_format(out.bytes(), ImageFormat::Jpeg)
            .expect("output should be valid jpeg");
        assert_eq!(decoded.dimensions(), (1024, 512));
    }

    #[test]
    fn reencode_keeps_small_image_dimensions() {
        let source = SourceImage::from_bytes(create_png_bytes(300, 200), "small.png");
        let out = reencode(&source, &PrepConfig::default()).expect("reencode should succeed");
        assert_eq!(out.dimensions(), Some((300, 200)));
    }

    #[test]
    fn default_pixel_limit_admits_phone_camera_photos() {
        let config = PrepConfig::default();

        // 48MP / 50MP / 108MP 传感器的常见输出尺寸
        for (w, h) in [(8000, 6000), (8160, 6120), (12000, 9000)] {
            assert!(validate_pixel_limits(&config, w, h).is_ok(), "{w}x{h}");
        }
        assert!(matches!(
            validate_pixel_limits(&config, 16_384, 16_384),
            Err(ImagePrepError::ResourceLimit(_))
        ));
    }

    #[test]
    fn reencode_rejects_too_many_pixels() {
        let mut config = PrepConfig::default();
        config.max_decoded_pixels = 10_000;
        let source = SourceImage::from_bytes(create_png_bytes(200, 200), "a.png");

        assert!(matches!(
            reencode(&source, &config),
            Err(ImagePrepError::ResourceLimit(_))
        ));
    }

    #[test]
    fn reencode_rejects_garbage() {
        let source = SourceImage::from_bytes(b"definitely not pixels".to_vec(), "x.png");
        assert!(reencode(&source, &PrepConfig::default()).is_err());
    }
}
