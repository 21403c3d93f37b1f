//! Closed edge maps for document boundary search.
//!
//! Two binary maps are produced for every image: one from the plain grayscale
//! image and one from a k-means posterized copy, which suppresses texture
//! inside large uniform regions. Both go through Gaussian blur, Canny and a
//! morphological close with a square structuring element so that document
//! borders form closed loops.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::processors::kmeans::{KMeansConfig, posterize};
use image::{GrayImage, RgbImage, imageops};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::close;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Edge map parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Gaussian sigma applied before Canny. 1.1 matches a 5x5 kernel.
    pub blur_sigma: f32,
    /// Canny low hysteresis threshold.
    pub canny_low: f32,
    /// Canny high hysteresis threshold.
    pub canny_high: f32,
    /// Side of the square closing element; must be odd.
    pub close_kernel_size: u8,
    /// Color quantization used for the posterized map.
    pub posterize: KMeansConfig,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 50.0,
            canny_high: 150.0,
            close_kernel_size: 11,
            posterize: KMeansConfig::default(),
        }
    }
}

impl ConfigValidator for EdgeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_positive("blur_sigma", self.blur_sigma)?;
        self.validate_ordered("canny_low", self.canny_low, "canny_high", self.canny_high)?;
        if self.close_kernel_size % 2 == 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!(
                    "close_kernel_size must be odd, got {}",
                    self.close_kernel_size
                ),
            });
        }
        self.posterize.validate()
    }
}

/// Edge maps of one image, intermediates included.
#[derive(Debug, Clone)]
pub struct EdgeMaps {
    /// Canny edges of the grayscale image.
    pub raw_edges: GrayImage,
    /// `raw_edges` after closing.
    pub raw_closed: GrayImage,
    /// The posterized color image.
    pub posterized: RgbImage,
    /// Canny edges of the posterized image.
    pub posterized_edges: GrayImage,
    /// `posterized_edges` after closing.
    pub posterized_closed: GrayImage,
}

impl EdgeMaps {
    /// The two closed maps in search order.
    pub fn closed_maps(&self) -> [&GrayImage; 2] {
        [&self.raw_closed, &self.posterized_closed]
    }

    /// Width and height of the maps.
    pub fn dimensions(&self) -> (u32, u32) {
        self.raw_closed.dimensions()
    }
}

/// Builds [`EdgeMaps`] from RGB images.
#[derive(Debug, Clone, Default)]
pub struct EdgeMapBuilder {
    config: EdgeConfig,
}

impl EdgeMapBuilder {
    /// Creates a builder with the given parameters.
    pub fn new(config: EdgeConfig) -> Self {
        Self { config }
    }

    /// Computes the raw and posterized closed edge maps.
    pub fn build(&self, image: &RgbImage) -> EdgeMaps {
        let gray = imageops::grayscale(image);
        let (raw_edges, raw_closed) = self.closed_edges(&gray);

        let posterized = posterize(image, &self.config.posterize);
        let poster_gray = imageops::grayscale(&posterized);
        let (posterized_edges, posterized_closed) = self.closed_edges(&poster_gray);

        debug!(
            width = image.width(),
            height = image.height(),
            raw_edge_pixels = count_set(&raw_closed),
            poster_edge_pixels = count_set(&posterized_closed),
            "Edge maps built"
        );

        EdgeMaps {
            raw_edges,
            raw_closed,
            posterized,
            posterized_edges,
            posterized_closed,
        }
    }

    fn closed_edges(&self, gray: &GrayImage) -> (GrayImage, GrayImage) {
        let blurred = gaussian_blur_f32(gray, self.config.blur_sigma);
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        // An L-infinity ball of radius r is a (2r + 1) square.
        let radius = self.config.close_kernel_size / 2;
        let closed = close(&edges, Norm::LInf, radius);
        (edges, closed)
    }
}

fn count_set(map: &GrayImage) -> usize {
    map.pixels().filter(|p| p[0] > 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect as DrawRect;

    #[test]
    fn test_config_validation() {
        assert!(EdgeConfig::default().validate().is_ok());
        let even = EdgeConfig {
            close_kernel_size: 10,
            ..Default::default()
        };
        assert!(even.validate().is_err());
        let inverted = EdgeConfig {
            canny_low: 200.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_uniform_image_has_no_edges() {
        let image = RgbImage::from_pixel(80, 60, Rgb([90, 90, 90]));
        let maps = EdgeMapBuilder::default().build(&image);
        assert_eq!(count_set(&maps.raw_closed), 0);
        assert_eq!(count_set(&maps.posterized_closed), 0);
        assert_eq!(maps.dimensions(), (80, 60));
    }

    #[test]
    fn test_rectangle_produces_edges() {
        let mut image = RgbImage::from_pixel(120, 100, Rgb([20, 20, 20]));
        draw_filled_rect_mut(&mut image, DrawRect::at(30, 20).of_size(60, 50), Rgb([235, 235, 235]));
        let maps = EdgeMapBuilder::default().build(&image);
        assert!(count_set(&maps.raw_edges) > 100);
        assert!(count_set(&maps.raw_closed) >= count_set(&maps.raw_edges));
        assert!(count_set(&maps.posterized_closed) > 100);
    }
}
