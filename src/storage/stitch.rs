//! Vertical stitching of split images.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::StoreError;

/// Stack `parts` top to bottom, left aligned, and encode the result in the
/// format implied by `name`'s extension (PNG when unknown). Narrower parts
/// leave the remainder of their row blank.
pub fn stitch_vertical(name: &str, parts: &[Vec<u8>]) -> Result<Vec<u8>, StoreError> {
    let image_error = |source| StoreError::Image {
        name: name.to_string(),
        source,
    };

    if parts.is_empty() {
        return Err(StoreError::EmptyGroup(name.to_string()));
    }

    let decoded = parts
        .iter()
        .map(|bytes| image::load_from_memory(bytes))
        .collect::<Result<Vec<_>, _>>()
        .map_err(image_error)?;

    let width = decoded.iter().map(|img| img.width()).max().unwrap_or(0);
    let height = decoded.iter().map(|img| img.height()).sum();

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 0]));
    let mut y = 0i64;
    for part in &decoded {
        image::imageops::overlay(&mut canvas, &part.to_rgba8(), 0, y);
        y += i64::from(part.height());
    }

    let format = ImageFormat::from_path(Path::new(name)).unwrap_or(ImageFormat::Png);
    let output = match format {
        // No alpha channel in JPEG.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
        _ => DynamicImage::ImageRgba8(canvas),
    };

    let mut buf = Cursor::new(Vec::new());
    output.write_to(&mut buf, format).map_err(image_error)?;
    Ok(buf.into_inner())
}
