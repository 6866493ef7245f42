use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

/// Longest side of an uploaded page after downscaling.
pub const MAX_UPLOAD_DIM: u32 = 1024;

/// Image payload handed to the vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub label: String,
}

impl ImageInput {
    pub fn from_bytes(bytes: Vec<u8>, mime_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            label: label.into(),
        }
    }

    /// Loads a page photo, flattening transparency onto white and
    /// re-encoding as JPEG no larger than [`MAX_UPLOAD_DIM`]. Files the
    /// `image` crate cannot decode are passed through untouched.
    pub fn from_path(path: &Path) -> Result<Self> {
        let label = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("image")
            .to_string();
        let raw = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        match image::load_from_memory(&raw) {
            Ok(decoded) => {
                let bytes = normalize_for_upload(decoded, MAX_UPLOAD_DIM)?;
                debug!(label = %label, bytes = bytes.len(), "normalized page image");
                Ok(Self::from_bytes(bytes, "image/jpeg", label))
            }
            Err(err) => {
                debug!(label = %label, "sending undecodable image as-is: {err}");
                Ok(Self::from_bytes(raw, guess_image_mime(path), label))
            }
        }
    }
}

fn normalize_for_upload(image: DynamicImage, max_dim: u32) -> Result<Vec<u8>> {
    let rgba = image.to_rgba8();
    let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend =
            |channel: u8| -> u8 { (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8 };
        flattened.put_pixel(
            x,
            y,
            Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
        );
    }
    let mut flattened = DynamicImage::ImageRgba8(flattened);
    if flattened.width().max(flattened.height()) > max_dim {
        flattened = flattened.resize(max_dim, max_dim, FilterType::Triangle);
    }
    let rgb = DynamicImage::ImageRgb8(flattened.to_rgb8());

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .encode_image(&rgb)
        .context("jpeg encode failed")?;
    Ok(bytes)
}

pub fn guess_image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" | "heif" => "image/heic",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    #[test]
    fn large_png_is_downscaled_to_jpeg() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("page.png");
        RgbaImage::from_pixel(2048, 1024, Rgba([10, 200, 30, 128])).save(&path)?;

        let input = ImageInput::from_path(&path)?;
        assert_eq!(input.mime_type, "image/jpeg");
        assert_eq!(input.label, "page.png");

        let decoded = image::load_from_memory(&input.bytes)?;
        assert_eq!(decoded.width(), 1024);
        assert_eq!(decoded.height(), 512);
        Ok(())
    }

    #[test]
    fn undecodable_file_passes_through() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("scan.webp");
        std::fs::write(&path, b"not really an image")?;

        let input = ImageInput::from_path(&path)?;
        assert_eq!(input.mime_type, "image/webp");
        assert_eq!(input.bytes, b"not really an image".to_vec());
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ImageInput::from_path(Path::new("/definitely/missing/page.jpg")).is_err());
    }
}
