//! Core error types for the layout extraction pipeline.
//!
//! This module defines the error types shared by every pipeline component,
//! including the main [`LayoutError`] enum and the [`ProcessingStage`] tag used
//! to say where a processing failure happened.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during low-level image operations.
#[derive(Debug, Error)]
pub enum ImageProcessError {
    /// The requested output size is zero in at least one dimension.
    #[error("invalid output size {width}x{height}")]
    InvalidOutputSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The projective transform could not be solved or inverted.
    #[error("degenerate perspective transform")]
    DegenerateTransform,
    /// A mask grid does not have the dimensions of the image it belongs to.
    #[error(
        "mask grid ({mask_width}x{mask_height}) does not match image ({image_width}x{image_height})",
        mask_width = .mask_size.0,
        mask_height = .mask_size.1,
        image_width = .image_size.0,
        image_height = .image_size.1
    )]
    MaskSizeMismatch {
        /// Mask size as (width, height).
        mask_size: (u32, u32),
        /// Image size as (width, height).
        image_size: (u32, u32),
    },
}

/// The pipeline stage in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Edge map construction (blur, Canny, closing).
    EdgeDetection,
    /// Color quantization.
    Posterization,
    /// Quadrilateral search over contours.
    QuadDetection,
    /// Perspective warp and orientation normalization.
    Rectification,
    /// Text region detection.
    TextDetection,
    /// Mask to text-box grouping.
    Grouping,
    /// Fetching model weights.
    ModelDownload,
    /// Writing debug or export artifacts.
    ArtifactOutput,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::EdgeDetection => write!(f, "edge detection"),
            ProcessingStage::Posterization => write!(f, "posterization"),
            ProcessingStage::QuadDetection => write!(f, "quadrilateral detection"),
            ProcessingStage::Rectification => write!(f, "rectification"),
            ProcessingStage::TextDetection => write!(f, "text detection"),
            ProcessingStage::Grouping => write!(f, "grouping"),
            ProcessingStage::ModelDownload => write!(f, "model download"),
            ProcessingStage::ArtifactOutput => write!(f, "artifact output"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Errors produced by the layout extraction pipeline.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// Error occurred while loading or saving an image.
    #[error("image codec")]
    Image(#[source] image::ImageError),

    /// Error occurred inside a pipeline stage.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A learned model cannot be used (weights missing, download failed,
    /// session creation failed). Strategies return this to step aside.
    #[error("model '{model_name}' unavailable: {reason}")]
    ModelUnavailable {
        /// Name of the unavailable model.
        model_name: String,
        /// Why the model cannot be used.
        reason: String,
    },

    /// Error occurred during a forward pass.
    #[error("inference failed in model '{model_name}': {context}")]
    Inference {
        /// The name of the model where inference failed.
        model_name: String,
        /// Additional context about the failure.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// A model file could not be fetched.
    #[error("download of '{url}' into '{}' failed", .path.display())]
    Download {
        /// Source URL.
        url: String,
        /// Destination path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor reshaping.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// JSON (de)serialization error.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type LayoutResult<T> = Result<T, LayoutError>;

impl From<image::ImageError> for LayoutError {
    fn from(error: image::ImageError) -> Self {
        Self::Image(error)
    }
}

impl From<crate::core::config::ConfigError> for LayoutError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

impl From<ImageProcessError> for LayoutError {
    fn from(error: ImageProcessError) -> Self {
        Self::Processing {
            kind: ProcessingStage::Generic,
            context: "image operation failed".to_string(),
            source: Box::new(error),
        }
    }
}

impl LayoutError {
    /// Wraps an error raised inside a pipeline stage.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Declares a model unavailable.
    pub fn model_unavailable(model_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model_name: model_name.into(),
            reason: reason.into(),
        }
    }

    /// Wraps an inference failure.
    pub fn inference(
        model_name: impl Into<String>,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.into(),
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates a configuration error for an out-of-range field.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use layout_extract::core::LayoutError;
    /// let err = LayoutError::invalid_field("nms_threshold", "a value in [0, 1]", "1.5");
    /// assert!(matches!(err, LayoutError::ConfigError { .. }));
    /// ```
    pub fn invalid_field(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConfigError {
            message: format!(
                "invalid value for field '{}': expected {}, got {}",
                field.into(),
                expected.into(),
                actual.into()
            ),
        }
    }

    /// Returns true when the error only means "this model cannot be used".
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_stage_display() {
        assert_eq!(ProcessingStage::QuadDetection.to_string(), "quadrilateral detection");
        assert_eq!(ProcessingStage::ArtifactOutput.to_string(), "artifact output");
    }

    #[test]
    fn test_processing_error_message() {
        let err = LayoutError::processing(
            ProcessingStage::Rectification,
            "warp",
            ImageProcessError::DegenerateTransform,
        );
        assert_eq!(err.to_string(), "rectification failed: warp");
    }

    #[test]
    fn test_model_unavailable_flag() {
        let err = LayoutError::model_unavailable("east", "weights missing");
        assert!(err.is_model_unavailable());
        assert!(!LayoutError::invalid_input("x").is_model_unavailable());
    }

    #[test]
    fn test_mask_size_mismatch_message() {
        let err = ImageProcessError::MaskSizeMismatch {
            mask_size: (4, 5),
            image_size: (6, 7),
        };
        assert_eq!(
            err.to_string(),
            "mask grid (4x5) does not match image (6x7)"
        );
    }
}
