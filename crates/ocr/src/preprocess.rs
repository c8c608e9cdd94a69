use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Images whose mean luminance falls below this are treated as dark-mode UI.
const DARK_MODE_THRESHOLD: f64 = 128.0;
const CONTRAST_FACTOR: f32 = 1.2;
const CONTRAST_MIDPOINT: f32 = 128.0;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Grayscale bitmap ready for OCR, stored as RGB with equal channels.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBitmap {
    pub image: RgbImage,
    /// Mean of `(R + G + B) / 3` over every source pixel.
    pub mean_luminance: f64,
    pub is_dark_mode: bool,
}

impl NormalizedBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_png(&self) -> Result<Vec<u8>, PreprocessError> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(self.image.clone())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| PreprocessError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

/// Decode raw image bytes (PNG / JPEG / WEBP / …) and normalize them.
///
/// `max_dimension` optionally bounds the longest side; `None` keeps the
/// original resolution.
pub fn normalize_bytes(
    data: &[u8],
    max_dimension: Option<u32>,
) -> Result<NormalizedBitmap, PreprocessError> {
    let img = image::load_from_memory(data)?;
    Ok(normalize(&downscale(img, max_dimension)))
}

/// Dark-mode inversion, luminance grayscale, then a linear contrast stretch
/// around the midpoint. Pure and deterministic: the same input always yields
/// the same bitmap.
pub fn normalize(img: &DynamicImage) -> NormalizedBitmap {
    let rgb = img.to_rgb8();
    let mean_luminance = mean_luminance(&rgb);
    let is_dark_mode = mean_luminance < DARK_MODE_THRESHOLD;
    debug!(
        width = rgb.width(),
        height = rgb.height(),
        mean_luminance,
        is_dark_mode,
        "normalizing image"
    );

    let image: RgbImage = ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let px = rgb.get_pixel(x, y);
        let px = if is_dark_mode { invert(*px) } else { *px };
        let v = stretch_contrast(grayscale(px));
        Rgb([v, v, v])
    });

    NormalizedBitmap {
        image,
        mean_luminance,
        is_dark_mode,
    }
}

/// Mean channel average over every pixel. An empty image counts as light.
pub fn mean_luminance(img: &RgbImage) -> f64 {
    let pixels = u64::from(img.width()) * u64::from(img.height());
    if pixels == 0 {
        return f64::from(u8::MAX);
    }
    let total: u64 = img
        .pixels()
        .map(|p| u64::from(p[0]) + u64::from(p[1]) + u64::from(p[2]))
        .sum();
    total as f64 / (pixels * 3) as f64
}

fn invert(px: Rgb<u8>) -> Rgb<u8> {
    Rgb([255 - px[0], 255 - px[1], 255 - px[2]])
}

fn grayscale(px: Rgb<u8>) -> f32 {
    0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2])
}

fn stretch_contrast(gray: f32) -> u8 {
    let v = (gray - CONTRAST_MIDPOINT) * CONTRAST_FACTOR + CONTRAST_MIDPOINT;
    v.clamp(0.0, 255.0).round() as u8
}

fn downscale(img: DynamicImage, max_dimension: Option<u32>) -> DynamicImage {
    match max_dimension {
        Some(max) if max > 0 && (img.width() > max || img.height() > max) => {
            debug!(from_w = img.width(), from_h = img.height(), max, "downscaling image");
            img.resize(max, max, image::imageops::FilterType::Lanczos3)
        }
        _ => img,
    }
}
