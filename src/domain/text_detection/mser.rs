use super::{TextBox, TextDetectorStrategy};
use crate::core::errors::LayoutError;
use crate::impl_config_validator;
use crate::processors::box_merge::{BoxMergeConfig, merge_boxes};
use crate::processors::geometry::Rect;
use crate::processors::mser::{MserParams, detect_regions_both};
use image::{RgbImage, imageops};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for [`MserDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MserConfig {
    /// Region extraction parameters.
    pub params: MserParams,
    /// Regions narrower or shorter than this are dropped.
    pub min_side: i32,
    /// Merging of the surviving region boxes.
    pub merge: BoxMergeConfig,
}

impl Default for MserConfig {
    fn default() -> Self {
        Self {
            params: MserParams::default(),
            min_side: 8,
            merge: BoxMergeConfig::default(),
        }
    }
}

impl_config_validator!(MserConfig {
    params: nested,
    min_side: min(0),
    merge: nested,
});

/// Model-free text detection from stable regions of both polarities.
#[derive(Debug, Clone, Default)]
pub struct MserDetector {
    config: MserConfig,
}

impl MserDetector {
    pub fn new(config: MserConfig) -> Self {
        Self { config }
    }
}

impl TextDetectorStrategy for MserDetector {
    fn name(&self) -> &str {
        "mser"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<TextBox>, LayoutError> {
        let gray = imageops::grayscale(image);
        let min_side = self.config.min_side;
        let rects: Vec<Rect> = detect_regions_both(&gray, &self.config.params)
            .into_iter()
            .map(|region| region.bbox)
            .filter(|r| r.width >= min_side && r.height >= min_side)
            .collect();

        let merged = merge_boxes(&rects, &self.config.merge);
        debug!(
            regions = rects.len(),
            merged = merged.boxes.len(),
            passes = merged.passes,
            "MSER boxes merged"
        );

        Ok(merged
            .boxes
            .into_iter()
            .map(|rect| TextBox::from_rect(rect, None))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect as DrawRect;

    #[test]
    fn test_blank_image_has_no_text() {
        let image = RgbImage::from_pixel(120, 80, Rgb([200, 200, 200]));
        assert!(MserDetector::default().detect(&image).unwrap().is_empty());
    }

    #[test]
    fn test_neighbouring_glyphs_merge() {
        // Three glyph-like blobs 6 px apart form one word box.
        let mut image = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        for i in 0..3 {
            draw_filled_rect_mut(
                &mut image,
                DrawRect::at(40 + i * 16, 40).of_size(10, 14),
                Rgb([0, 0, 0]),
            );
        }
        let boxes = MserDetector::default().detect(&image).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].rect(), Rect::new(40, 40, 42, 14));
    }

    #[test]
    fn test_small_regions_dropped() {
        // 30x4 passes the area bounds but is thinner than min_side.
        let mut image = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut image, DrawRect::at(20, 20).of_size(30, 4), Rgb([0, 0, 0]));
        assert!(MserDetector::default().detect(&image).unwrap().is_empty());
    }
}
