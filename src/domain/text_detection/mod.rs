//! Text region detection.
//!
//! Detection runs an ordered list of strategies. A strategy that reports an
//! error (a missing model, say) or, when `fallback_on_empty` is set, finds
//! nothing hands over to the next one. The default order is the EAST network
//! followed by the model-free MSER detector.

mod east;
mod mser;

pub use east::{EastConfig, EastDetector};
pub use mser::{MserConfig, MserDetector};

use crate::core::errors::LayoutError;
use crate::impl_config_validator;
use crate::processors::geometry::Rect;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// An axis-aligned text region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Network confidence; `None` for model-free detections.
    pub score: Option<f32>,
}

impl TextBox {
    /// Creates a text box.
    pub fn new(x: i32, y: i32, width: i32, height: i32, score: Option<f32>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }

    /// Creates a text box covering `rect`.
    pub fn from_rect(rect: Rect, score: Option<f32>) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height, score)
    }

    /// The box as a [`Rect`].
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Score used for ranking; model-free boxes count as certain.
    pub fn confidence(&self) -> f32 {
        self.score.unwrap_or(1.0)
    }
}

/// One way of finding text regions.
pub trait TextDetectorStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Detects text regions in `image`.
    ///
    /// [`LayoutError::ModelUnavailable`] means the strategy cannot run at all
    /// and the next one should be tried.
    fn detect(&self, image: &RgbImage) -> Result<Vec<TextBox>, LayoutError>;
}

/// Built-in strategies, as named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDetectorKind {
    /// EAST score/geometry network.
    East,
    /// Maximally stable extremal regions.
    Mser,
}

/// Configuration for [`TextRegionDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDetectionConfig {
    /// Strategies in the order they are tried.
    pub strategies: Vec<TextDetectorKind>,
    /// Move on to the next strategy when one finds nothing.
    pub fallback_on_empty: bool,
    /// EAST parameters.
    pub east: EastConfig,
    /// MSER parameters.
    pub mser: MserConfig,
}

impl Default for TextDetectionConfig {
    fn default() -> Self {
        Self {
            strategies: vec![TextDetectorKind::East, TextDetectorKind::Mser],
            fallback_on_empty: true,
            east: EastConfig::default(),
            mser: MserConfig::default(),
        }
    }
}

impl_config_validator!(TextDetectionConfig {
    strategies: non_empty,
    east: nested,
    mser: nested,
});

/// Runs text detection strategies in order until one produces boxes.
pub struct TextRegionDetector {
    strategies: Vec<Box<dyn TextDetectorStrategy>>,
    fallback_on_empty: bool,
}

impl std::fmt::Debug for TextRegionDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRegionDetector")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("fallback_on_empty", &self.fallback_on_empty)
            .finish()
    }
}

impl TextRegionDetector {
    /// Builds the configured strategy chain.
    pub fn from_config(config: &TextDetectionConfig) -> Self {
        let strategies = config
            .strategies
            .iter()
            .map(|kind| -> Box<dyn TextDetectorStrategy> {
                match kind {
                    TextDetectorKind::East => Box::new(EastDetector::new(config.east.clone())),
                    TextDetectorKind::Mser => Box::new(MserDetector::new(config.mser.clone())),
                }
            })
            .collect();
        Self::with_strategies(strategies, config.fallback_on_empty)
    }

    /// Uses an explicit strategy list.
    pub fn with_strategies(
        strategies: Vec<Box<dyn TextDetectorStrategy>>,
        fallback_on_empty: bool,
    ) -> Self {
        Self {
            strategies,
            fallback_on_empty,
        }
    }

    /// Detects text regions; an empty list when every strategy fails.
    pub fn detect(&self, image: &RgbImage) -> Vec<TextBox> {
        for strategy in &self.strategies {
            match strategy.detect(image) {
                Ok(boxes) if boxes.is_empty() && self.fallback_on_empty => {
                    debug!(strategy = strategy.name(), "No text found, trying next strategy");
                }
                Ok(boxes) => {
                    info!(strategy = strategy.name(), count = boxes.len(), "Text regions detected");
                    return boxes;
                }
                Err(e) if e.is_model_unavailable() => {
                    warn!(strategy = strategy.name(), error = %e, "Text detector unavailable");
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Text detector failed");
                }
            }
        }
        Vec::new()
    }
}

impl Default for TextRegionDetector {
    fn default() -> Self {
        Self::from_config(&TextDetectionConfig::default())
    }
}
