//! Document boundary search.
//!
//! Outer contours of both closed edge maps are ranked by area. The largest
//! few are simplified with Douglas-Peucker at increasing tolerances until one
//! of them reduces to a convex quadrilateral of sufficient size.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::processors::edges::EdgeMaps;
use crate::processors::geometry::{Contour, Quadrilateral};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for [`QuadDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadDetectionConfig {
    /// Number of ranked contours tried. 1 only considers the largest.
    pub max_candidates: usize,
    /// Simplification tolerances as fractions of the contour perimeter,
    /// tried in order.
    pub epsilon_ratios: Vec<f32>,
    /// Smallest accepted quadrilateral area as a fraction of the image area.
    pub min_area_ratio: f32,
    /// Reject self-intersecting or concave quadrilaterals.
    pub require_convex: bool,
}

impl Default for QuadDetectionConfig {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            epsilon_ratios: vec![0.005, 0.01, 0.02, 0.04],
            min_area_ratio: 0.01,
            require_convex: true,
        }
    }
}

impl ConfigValidator for QuadDetectionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_non_zero("max_candidates", self.max_candidates)?;
        if self.epsilon_ratios.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "epsilon_ratios must not be empty".to_string(),
            });
        }
        for &ratio in &self.epsilon_ratios {
            self.validate_positive("epsilon_ratios", ratio)?;
        }
        self.validate_unit_interval("min_area_ratio", self.min_area_ratio)
    }
}

/// Finds the document quadrilateral in a pair of edge maps.
#[derive(Debug, Clone, Default)]
pub struct QuadDetector {
    config: QuadDetectionConfig,
}

impl QuadDetector {
    pub fn new(config: QuadDetectionConfig) -> Self {
        Self { config }
    }

    /// Returns the best quadrilateral, or `None` when no ranked contour
    /// simplifies to an acceptable one.
    ///
    /// `dimensions` is the `(width, height)` of the analysed image.
    pub fn detect(&self, maps: &EdgeMaps, dimensions: (u32, u32)) -> Option<Quadrilateral> {
        let mut contours: Vec<Contour> = maps
            .closed_maps()
            .into_iter()
            .flat_map(external_contours)
            .collect();
        // Stable sort: equal areas keep raw-before-posterized order.
        contours.sort_by(|a, b| b.area().total_cmp(&a.area()));

        let image_area = dimensions.0 as f32 * dimensions.1 as f32;
        let min_area = self.config.min_area_ratio * image_area;

        for (rank, contour) in contours.iter().take(self.config.max_candidates).enumerate() {
            let Some(quad) = self.simplify(contour) else {
                debug!(rank, vertices = contour.len(), "Contour never reduced to four vertices");
                continue;
            };
            if self.config.require_convex && !quad.is_convex() {
                debug!(rank, "Rejected concave quadrilateral");
                continue;
            }
            if quad.area() < min_area {
                debug!(rank, area = quad.area(), min_area, "Rejected small quadrilateral");
                continue;
            }
            debug!(rank, corners = ?quad.corners, "Document quadrilateral found");
            return Some(quad);
        }

        debug!(candidates = contours.len(), "No document quadrilateral");
        None
    }

    /// The quadrilateral produced by the first tolerance giving four vertices.
    fn simplify(&self, contour: &Contour) -> Option<Quadrilateral> {
        let perimeter = contour.perimeter();
        self.config
            .epsilon_ratios
            .iter()
            .map(|ratio| contour.approx_poly_dp(ratio * perimeter))
            .find(|approx| approx.len() == 4)
            .and_then(|approx| Quadrilateral::from_contour(&approx))
    }
}

/// Top-level outer borders, chain-compressed.
fn external_contours(map: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(map)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| Contour::from_imageproc(c).compress_chain())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::edges::EdgeMapBuilder;
    use crate::processors::geometry::Point;
    use image::{Luma, Rgb, RgbImage};
    use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
    use imageproc::point::Point as DrawPoint;
    use imageproc::rect::Rect as DrawRect;

    fn near(a: Point, b: Point, tolerance: f32) -> bool {
        a.distance(&b) <= tolerance
    }

    #[test]
    fn test_white_rectangle_on_dark() {
        let mut image = RgbImage::from_pixel(300, 200, Rgb([25, 25, 25]));
        draw_filled_rect_mut(&mut image, DrawRect::at(60, 50).of_size(180, 100), Rgb([240, 240, 240]));
        let maps = EdgeMapBuilder::default().build(&image);
        let quad = QuadDetector::default()
            .detect(&maps, image.dimensions())
            .expect("quadrilateral");

        assert!(near(quad.top_left(), Point::new(60.0, 50.0), 4.0), "{quad:?}");
        assert!(near(quad.top_right(), Point::new(239.0, 50.0), 4.0), "{quad:?}");
        assert!(near(quad.bottom_right(), Point::new(239.0, 149.0), 4.0), "{quad:?}");
        assert!(near(quad.bottom_left(), Point::new(60.0, 149.0), 4.0), "{quad:?}");
    }

    fn rotated_rectangle(center: (f32, f32), half: (f32, f32), degrees: f32) -> [Point; 4] {
        let (sin, cos) = degrees.to_radians().sin_cos();
        [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].map(|(sx, sy): (f32, f32)| {
            let (dx, dy) = (sx * half.0, sy * half.1);
            Point::new(center.0 + dx * cos - dy * sin, center.1 + dx * sin + dy * cos)
        })
    }

    #[test]
    fn test_rotated_and_skewed_documents() {
        let skewed = [
            Point::new(70.0, 40.0),
            Point::new(235.0, 62.0),
            Point::new(262.0, 248.0),
            Point::new(48.0, 228.0),
        ];
        for corners in [rotated_rectangle((150.0, 150.0), (95.0, 65.0), 17.0), skewed] {
            let mut image = RgbImage::from_pixel(300, 300, Rgb([30, 30, 30]));
            let polygon = corners.map(|p| DrawPoint::new(p.x.round() as i32, p.y.round() as i32));
            draw_polygon_mut(&mut image, &polygon, Rgb([235, 235, 235]));

            let maps = EdgeMapBuilder::default().build(&image);
            let quad = QuadDetector::default()
                .detect(&maps, image.dimensions())
                .expect("quadrilateral");
            let expected = Quadrilateral::from_unordered(corners);
            for (found, want) in quad.corners.iter().zip(expected.corners.iter()) {
                assert!(near(*found, *want, 4.0), "{found:?} vs {want:?} in {quad:?}");
            }
        }
    }

    #[test]
    fn test_uniform_image_has_no_quad() {
        let image = RgbImage::from_pixel(120, 90, Rgb([128, 128, 128]));
        let maps = EdgeMapBuilder::default().build(&image);
        assert!(QuadDetector::default().detect(&maps, image.dimensions()).is_none());
    }

    fn maps_from_mask(mask: GrayImage) -> EdgeMaps {
        EdgeMaps {
            raw_edges: mask.clone(),
            raw_closed: mask.clone(),
            posterized: RgbImage::new(mask.width(), mask.height()),
            posterized_edges: GrayImage::new(mask.width(), mask.height()),
            posterized_closed: GrayImage::new(mask.width(), mask.height()),
        }
    }

    #[test]
    fn test_small_quad_rejected_by_area() {
        let mut mask = GrayImage::new(200, 200);
        draw_filled_rect_mut(&mut mask, DrawRect::at(10, 10).of_size(12, 12), Luma([255]));
        let maps = maps_from_mask(mask);
        assert!(QuadDetector::default().detect(&maps, (200, 200)).is_none());

        let lenient = QuadDetector::new(QuadDetectionConfig {
            min_area_ratio: 0.001,
            ..Default::default()
        });
        assert!(lenient.detect(&maps, (200, 200)).is_some());
    }

    #[test]
    fn test_falls_back_to_lower_ranked_contour() {
        // The largest blob is a triangle; the second is a square.
        let mut mask = GrayImage::new(300, 200);
        let triangle = [
            DrawPoint::new(10, 10),
            DrawPoint::new(150, 10),
            DrawPoint::new(10, 190),
        ];
        draw_polygon_mut(&mut mask, &triangle, Luma([255]));
        draw_filled_rect_mut(&mut mask, DrawRect::at(200, 50).of_size(60, 60), Luma([255]));
        let maps = maps_from_mask(mask);

        let quad = QuadDetector::default().detect(&maps, (300, 200)).expect("square");
        assert!(near(quad.top_left(), Point::new(200.0, 50.0), 2.0), "{quad:?}");
        assert!(near(quad.bottom_right(), Point::new(259.0, 109.0), 2.0), "{quad:?}");

        let largest_only = QuadDetector::new(QuadDetectionConfig {
            max_candidates: 1,
            ..Default::default()
        });
        assert!(largest_only.detect(&maps, (300, 200)).is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(QuadDetectionConfig::default().validate().is_ok());
        let bad = QuadDetectionConfig {
            max_candidates: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
