//! Configuration error types and validation traits.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The configuration file could not be read.
    #[error("cannot read configuration file '{}'", .path.display())]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected type.
    #[error("cannot parse configuration file '{}'", .path.display())]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// A trait for validating configuration parameters.
///
/// Implementors only need [`validate`](ConfigValidator::validate); the
/// provided helpers cover the range checks shared by the pipeline configs.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Checks that `value` lies in `[0, 1]`.
    fn validate_unit_interval(&self, field: &str, value: f32) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&value) {
            Err(ConfigError::invalid(format!(
                "{field} must be between 0.0 and 1.0, got {value}"
            )))
        } else {
            Ok(())
        }
    }

    /// Checks that `value` is finite and strictly positive.
    fn validate_positive(&self, field: &str, value: f32) -> Result<(), ConfigError> {
        if !value.is_finite() || value <= 0.0 {
            Err(ConfigError::invalid(format!(
                "{field} must be a positive number, got {value}"
            )))
        } else {
            Ok(())
        }
    }

    /// Checks that a count is non-zero.
    fn validate_non_zero(&self, field: &str, value: usize) -> Result<(), ConfigError> {
        if value == 0 {
            Err(ConfigError::invalid(format!("{field} must be greater than 0")))
        } else {
            Ok(())
        }
    }

    /// Checks that `low <= high`.
    fn validate_ordered(
        &self,
        low_field: &str,
        low: f32,
        high_field: &str,
        high: f32,
    ) -> Result<(), ConfigError> {
        if low > high {
            Err(ConfigError::invalid(format!(
                "{low_field} ({low}) must not exceed {high_field} ({high})"
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl ConfigValidator for Probe {
        fn validate(&self) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    #[test]
    fn test_unit_interval() {
        assert!(Probe.validate_unit_interval("x", 0.5).is_ok());
        assert!(Probe.validate_unit_interval("x", 1.5).is_err());
        assert!(Probe.validate_unit_interval("x", -0.1).is_err());
    }

    #[test]
    fn test_positive_and_ordered() {
        assert!(Probe.validate_positive("sigma", 1.1).is_ok());
        assert!(Probe.validate_positive("sigma", 0.0).is_err());
        assert!(Probe.validate_positive("sigma", f32::NAN).is_err());
        assert!(Probe.validate_ordered("low", 50.0, "high", 150.0).is_ok());
        assert!(Probe.validate_ordered("low", 200.0, "high", 150.0).is_err());
    }
}
