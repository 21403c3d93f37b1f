//! Image loading and resizing helpers.

use crate::core::errors::{LayoutError, LayoutResult};
use image::{RgbImage, imageops};
use std::path::Path;
use tracing::debug;

/// Loads an image from disk and converts it to RGB8.
pub fn load_image(path: impl AsRef<Path>) -> LayoutResult<RgbImage> {
    let path = path.as_ref();
    let image = image::open(path)?.to_rgb8();
    if image.width() == 0 || image.height() == 0 {
        return Err(LayoutError::invalid_input(format!(
            "image '{}' is empty",
            path.display()
        )));
    }
    Ok(image)
}

/// Shrinks `image` so that its longer side is at most `max_dimension`.
///
/// The new size is `floor(side * scale)` per axis (never below 1) and pixels
/// are box-averaged. Images already within the limit are returned unchanged.
pub fn downscale_to_max_dimension(image: &RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let longest = width.max(height);
    if max_dimension == 0 || longest <= max_dimension {
        return image.clone();
    }

    let scale = max_dimension as f64 / longest as f64;
    let new_width = ((width as f64 * scale) as u32).max(1);
    let new_height = ((height as f64 * scale) as u32).max(1);
    debug!(width, height, new_width, new_height, "Downscaling input image");
    imageops::thumbnail(image, new_width, new_height)
}
