use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode upload as an image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode uploaded image bytes (JPEG / PNG / WEBP / …) and return normalized
/// PNG bytes ready for OCR. PDFs and other non-raster uploads fail with `Load`.
pub fn prepare_for_ocr(data: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    let (width, height) = (img.width(), img.height());
    let out = normalize(img);
    tracing::debug!(width, height, out_width = out.width(), out_height = out.height(), "Normalized upload");
    encode_as_png(out)
}

const MAX_DIMENSION: u32 = 2800;

/// Downscale, grayscale, contrast stretch.
fn normalize(img: DynamicImage) -> GrayImage {
    // Tesseract works best at 300 DPI / ~2000 px.
    let img = if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    let mut gray = img.to_luma8();
    let (lo, hi) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), Luma([v])| (lo.min(*v), hi.max(*v)));
    if hi > lo {
        let span = u32::from(hi - lo);
        for Luma([v]) in gray.pixels_mut() {
            *v = (u32::from(*v - lo) * 255 / span) as u8;
        }
    }
    gray
}

fn encode_as_png(img: GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
