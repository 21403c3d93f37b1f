//! Declarative validation for configuration structs.

/// Implements [`ConfigValidator`](crate::core::config::ConfigValidator) from a
/// list of per-field rules.
///
/// Supported rules: `range(min, max)`, `min(v)`, `max(v)`, `positive`, `odd`,
/// `non_empty` and `nested` (delegates to the field's own validator).
///
/// ```rust
/// use layout_extract::impl_config_validator;
/// use layout_extract::core::config::ConfigValidator;
///
/// #[derive(Default)]
/// struct Thresholds {
///     score: f32,
///     kernel: u8,
/// }
///
/// impl_config_validator!(Thresholds {
///     score: range(0.0, 1.0),
///     kernel: odd,
/// });
///
/// let t = Thresholds { score: 0.5, kernel: 3 };
/// assert!(t.validate().is_ok());
/// ```
#[macro_export]
macro_rules! impl_config_validator {
    ($type_name:ident { $($field:ident: $validator:ident $(($($args:tt)*))?),* $(,)? }) => {
        impl $crate::core::config::ConfigValidator for $type_name {
            fn validate(&self) -> Result<(), $crate::core::config::ConfigError> {
                $(
                    $crate::validate_field!(self, $field, $validator $(($($args)*))?);
                )*
                Ok(())
            }
        }
    };
}

/// Helper macro for field validation.
#[macro_export]
macro_rules! validate_field {
    ($self:expr, $field:ident, range($min:expr, $max:expr)) => {
        if !($min..=$max).contains(&$self.$field) {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!(
                    "{} must be between {} and {}, got {}",
                    stringify!($field),
                    $min,
                    $max,
                    $self.$field
                ),
            });
        }
    };

    ($self:expr, $field:ident, min($min_val:expr)) => {
        if $self.$field < $min_val {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!("{} must be at least {}", stringify!($field), $min_val),
            });
        }
    };

    ($self:expr, $field:ident, max($max_val:expr)) => {
        if $self.$field > $max_val {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!("{} must be at most {}", stringify!($field), $max_val),
            });
        }
    };

    ($self:expr, $field:ident, positive) => {
        $crate::core::config::ConfigValidator::validate_positive(
            $self,
            stringify!($field),
            $self.$field as f32,
        )?;
    };

    ($self:expr, $field:ident, odd) => {
        if $self.$field % 2 == 0 {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!("{} must be odd, got {}", stringify!($field), $self.$field),
            });
        }
    };

    ($self:expr, $field:ident, non_empty) => {
        if $self.$field.is_empty() {
            return Err($crate::core::config::ConfigError::InvalidConfig {
                message: format!("{} must not be empty", stringify!($field)),
            });
        }
    };

    ($self:expr, $field:ident, nested) => {
        $crate::core::config::ConfigValidator::validate(&$self.$field)?;
    };
}

#[cfg(test)]
mod tests {
    use crate::core::config::ConfigValidator;

    struct Sample {
        ratio: f32,
        count: usize,
        kernel: u8,
        names: Vec<String>,
    }

    impl_config_validator!(Sample {
        ratio: range(0.0, 1.0),
        count: min(1),
        kernel: odd,
        names: non_empty,
    });

    fn sample() -> Sample {
        Sample {
            ratio: 0.5,
            count: 2,
            kernel: 11,
            names: vec!["east".to_string()],
        }
    }

    #[test]
    fn test_valid_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_each_rule_rejects() {
        assert!(Sample { ratio: 1.5, ..sample() }.validate().is_err());
        assert!(Sample { count: 0, ..sample() }.validate().is_err());
        assert!(Sample { kernel: 10, ..sample() }.validate().is_err());
        assert!(Sample { names: vec![], ..sample() }.validate().is_err());
    }
}
