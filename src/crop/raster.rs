//! Pixel work on top of the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` |
//! | Sniff MIME type | `image::guess_format` |
//! | Crop | `DynamicImage::crop_imm` on natural pixels |
//! | Downscale | `image::imageops::resize` with `Lanczos3` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` (alpha dropped) |

use super::calculations::{PixelRect, Size, fit_within};
use crate::config::UploadConfig;
use crate::upload::UploadFile;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError};
use std::path::Path;

/// Decode an in-memory image, guessing the format from its magic bytes.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(bytes)
}

/// MIME type of encoded image bytes, if the format is recognized.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

pub fn dimensions(image: &DynamicImage) -> Size {
    let (width, height) = image.dimensions();
    Size::new(width, height)
}

/// Cut `rect` out of the full-resolution image.
pub fn crop(image: &DynamicImage, rect: PixelRect) -> DynamicImage {
    image.crop_imm(rect.x, rect.y, rect.width, rect.height)
}

/// Encode as baseline JPEG. Transparency is flattened away.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(buf)
}

/// Write JPEG bytes to disk.
pub fn save_jpeg(path: &Path, jpeg: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, jpeg)
}

/// Shrink an upload to fit `max_width`×`max_height` and re-encode as JPEG.
///
/// Images already inside the box are re-encoded at their own size. The
/// returned file keeps the original stem with a `.jpg` extension.
pub fn optimize_for_upload(file: &UploadFile, rules: &UploadConfig) -> Result<UploadFile, ImageError> {
    let img = decode(&file.bytes)?;
    let source = dimensions(&img);
    let target = fit_within(source, Size::new(rules.max_width, rules.max_height));
    let scaled = if target == source {
        img
    } else {
        img.resize_exact(target.width, target.height, FilterType::Lanczos3)
    };
    let jpeg = encode_jpeg(&scaled, rules.quality)?;

    let stem = Path::new(&file.name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    Ok(UploadFile::new(format!("{stem}.jpg"), "image/jpeg", jpeg))
}
