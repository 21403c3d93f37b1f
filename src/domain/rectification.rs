//! Perspective rectification of a detected document.

use crate::core::errors::{LayoutError, LayoutResult, ProcessingStage};
use crate::processors::geometry::{Point, Quadrilateral};
use crate::utils::transform::{perspective_transform, to_portrait, warp_perspective};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for [`PerspectiveRectifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectificationConfig {
    /// Rotate landscape results to portrait.
    pub portrait: bool,
}

impl Default for RectificationConfig {
    fn default() -> Self {
        Self { portrait: true }
    }
}

/// Warps a quadrilateral region onto an axis-aligned rectangle.
#[derive(Debug, Clone, Default)]
pub struct PerspectiveRectifier {
    config: RectificationConfig,
}

impl PerspectiveRectifier {
    pub fn new(config: RectificationConfig) -> Self {
        Self { config }
    }

    /// Rectifies the region of `image` bounded by `quad`.
    ///
    /// The output is as wide as the longer of the top and bottom edges and as
    /// tall as the longer of the side edges, then portrait-normalized when
    /// configured.
    pub fn rectify(&self, image: &RgbImage, quad: &Quadrilateral) -> LayoutResult<RgbImage> {
        let width = quad.max_width() as u32;
        let height = quad.max_height() as u32;
        if width == 0 || height == 0 {
            return Err(LayoutError::invalid_input(format!(
                "quadrilateral collapses to {width}x{height}"
            )));
        }

        let (w, h) = ((width - 1) as f32, (height - 1) as f32);
        let target = [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ];
        let matrix = perspective_transform(&quad.corners, &target).map_err(|e| {
            LayoutError::processing(ProcessingStage::Rectification, "homography", e)
        })?;
        let warped = warp_perspective(image, &matrix, width, height).map_err(|e| {
            LayoutError::processing(ProcessingStage::Rectification, "warp", e)
        })?;
        debug!(width, height, "Document rectified");

        Ok(self.to_portrait(&warped))
    }

    /// Rotates landscape images by 90 degrees when portrait output is enabled.
    pub fn to_portrait(&self, image: &RgbImage) -> RgbImage {
        if self.config.portrait {
            to_portrait(image)
        } else {
            image.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point as DrawPoint;

    const PAPER: Rgb<u8> = Rgb([230, 230, 230]);

    fn skewed_document() -> (RgbImage, Quadrilateral) {
        let corners = [
            Point::new(40.0, 30.0),
            Point::new(250.0, 45.0),
            Point::new(240.0, 160.0),
            Point::new(30.0, 150.0),
        ];
        let mut image = RgbImage::from_pixel(300, 200, Rgb([20, 20, 20]));
        let polygon: Vec<DrawPoint<i32>> = corners
            .iter()
            .map(|p| DrawPoint::new(p.x as i32, p.y as i32))
            .collect();
        draw_polygon_mut(&mut image, &polygon, PAPER);
        (image, Quadrilateral::from_unordered(corners))
    }

    #[test]
    fn test_rectified_size_and_content() {
        let (image, quad) = skewed_document();
        let rectifier = PerspectiveRectifier::new(RectificationConfig { portrait: false });
        let out = rectifier.rectify(&image, &quad).unwrap();

        let expected_w = quad.max_width() as u32;
        let expected_h = quad.max_height() as u32;
        assert_eq!(out.dimensions(), (expected_w, expected_h));
        // Interior of the output is paper.
        let center = out.get_pixel(expected_w / 2, expected_h / 2);
        assert!(center[0] > 200, "{center:?}");
        let inner = out.get_pixel(10, 10);
        assert!(inner[0] > 200, "{inner:?}");
    }

    #[test]
    fn test_aspect_ratio_of_axis_aligned_quad() {
        let image = RgbImage::from_pixel(400, 300, PAPER);
        let quad = Quadrilateral::from_unordered([
            Point::new(50.0, 50.0),
            Point::new(350.0, 50.0),
            Point::new(350.0, 200.0),
            Point::new(50.0, 200.0),
        ]);
        let out = PerspectiveRectifier::new(RectificationConfig { portrait: false })
            .rectify(&image, &quad)
            .unwrap();
        let ratio = out.width() as f32 / out.height() as f32;
        assert!((ratio - 2.0).abs() < 0.02, "{ratio}");
    }

    #[test]
    fn test_portrait_normalization() {
        let (image, quad) = skewed_document();
        let out = PerspectiveRectifier::default().rectify(&image, &quad).unwrap();
        assert!(out.height() >= out.width());
    }

    #[test]
    fn test_collapsed_quad_is_invalid() {
        let image = RgbImage::new(10, 10);
        let quad = Quadrilateral {
            corners: [Point::new(3.0, 3.0); 4],
        };
        assert!(matches!(
            PerspectiveRectifier::default().rectify(&image, &quad),
            Err(LayoutError::InvalidInput { .. })
        ));
    }
}
