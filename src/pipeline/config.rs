//! Pipeline configuration and its JSON loader.

use crate::core::config::{ConfigError, ConfigValidator, DebugConfig, ParallelPolicy};
use crate::domain::grouping::GroupingConfig;
use crate::domain::quad_detection::QuadDetectionConfig;
use crate::domain::rectification::RectificationConfig;
use crate::domain::text_detection::TextDetectionConfig;
use crate::processors::edges::EdgeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of every pipeline stage.
///
/// Every field has a default, so a configuration file only needs to list
/// what it changes:
///
/// ```rust
/// use layout_extract::pipeline::PipelineConfig;
///
/// let config: PipelineConfig = serde_json::from_str(
///     r#"{"max_dimension": 1024, "text_detection": {"strategies": ["mser"]}}"#,
/// )?;
/// assert_eq!(config.max_dimension, Some(1024));
/// assert_eq!(config.grouping.overlap_threshold, 0.5);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Inputs are downscaled so that their longer side is at most this.
    pub max_dimension: Option<u32>,
    /// Edge map construction.
    pub edges: EdgeConfig,
    /// Document quadrilateral search.
    pub quad: QuadDetectionConfig,
    /// Perspective warp.
    pub rectification: RectificationConfig,
    /// Text region detection.
    pub text_detection: TextDetectionConfig,
    /// Mask grouping.
    pub grouping: GroupingConfig,
    /// Debug artifact output.
    pub debug: DebugConfig,
    /// Batch parallelism.
    pub parallel: ParallelPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dimension: Some(1600),
            edges: EdgeConfig::default(),
            quad: QuadDetectionConfig::default(),
            rectification: RectificationConfig::default(),
            text_detection: TextDetectionConfig::default(),
            grouping: GroupingConfig::default(),
            debug: DebugConfig::default(),
            parallel: ParallelPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigValidator for PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dimension == Some(0) {
            return Err(ConfigError::InvalidConfig {
                message: "max_dimension must be greater than 0".to_string(),
            });
        }
        self.edges.validate()?;
        self.quad.validate()?;
        self.text_detection.validate()?;
        self.grouping.validate()?;
        if let Some(threads) = self.parallel.max_threads {
            self.validate_non_zero("parallel.max_threads", threads)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"edges": {{"canny_low": 30.0}}, "quad": {{"max_candidates": 1}}, "debug": {{"enabled": true}}}}"#
        )
        .unwrap();
        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.edges.canny_low, 30.0);
        assert_eq!(config.edges.canny_high, 150.0);
        assert_eq!(config.quad.max_candidates, 1);
        assert!(config.debug.enabled);
        assert_eq!(config.debug.dir, std::path::PathBuf::from("images/debug"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"grouping": {{"overlap_threshold": 2.0}}}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(file.path()),
            Err(ConfigError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_read_and_parse_errors() {
        assert!(matches!(
            PipelineConfig::from_json_file("/nonexistent/config.json"),
            Err(ConfigError::Read { .. })
        ));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
