//! Image normalization: bound dimensions and encode to canonical PNG.
//!
//! PNG is the single canonical still-image format for every emitted page.
//! It is lossless — text crispness matters far more than file size when a
//! VLM has to read fine print — and every vision API accepts it.
//!
//! Normalization is a pure function of the decoded pixels: pages never grow,
//! only shrink, so a page already within bounds is passed through untouched.

use crate::output::{RenderedPage, RenderStrategyKind};
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Downscale `img` so that `max(width, height) <= max_dimension`,
/// preserving aspect ratio. Images already within bounds are returned as-is.
pub fn normalize(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let largest = w.max(h);
    if largest <= max_dimension {
        return img;
    }

    let scale = max_dimension as f64 / largest as f64;
    let new_w = ((w as f64 * scale).round() as u32).max(1);
    let new_h = ((h as f64 * scale).round() as u32).max(1);
    debug!("Downscaling {}x{} -> {}x{}", w, h, new_w, new_h);

    // Lanczos keeps rendered text legible after heavy downscaling
    img.resize_exact(new_w, new_h, FilterType::Lanczos3)
}

/// Normalize and PNG-encode one page image.
pub fn encode_page(
    index: usize,
    img: DynamicImage,
    strategy: RenderStrategyKind,
    max_dimension: u32,
) -> Result<RenderedPage, image::ImageError> {
    let img = normalize(img, max_dimension);
    let (width, height) = (img.width(), img.height());

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    debug!("Encoded page {} -> {} bytes PNG", index, png.len());

    Ok(RenderedPage {
        index,
        width,
        height,
        png,
        strategy,
    })
}
