//! Validation error types

use std::fmt;

/// Validation error for request input
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field is shorter than the minimum length
    TooShort { field: &'static str, min: usize },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., slug, email)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Number outside the accepted range
    OutOfRange { field: &'static str, min: f64, max: f64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooShort { field, min } => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Require a trimmed string of at least `min` and at most `max` characters.
pub fn bounded_text(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(ValidationError::Empty { field });
    }
    if len < min {
        return Err(ValidationError::TooShort { field, min });
    }
    if len > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_owned())
}

/// Require `value` to lie within `min..=max`.
pub fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, ValidationError> {
    if value.is_nan() || value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max });
    }
    Ok(value)
}

/// Reject negative money amounts.
pub fn non_negative_cents(field: &'static str, cents: i64) -> Result<i64, ValidationError> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field,
            min: 0.0,
            max: i64::MAX as f64,
        });
    }
    Ok(cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "title",
            max: 256,
        };
        assert_eq!(
            err.to_string(),
            "title exceeds maximum length of 256 characters"
        );
        let err = ValidationError::TooShort { field: "name", min: 2 };
        assert_eq!(err.to_string(), "name must be at least 2 characters");
    }

    #[test]
    fn bounded_text_trims_and_checks() {
        assert_eq!(bounded_text("name", "  Ana ", 2, 10).unwrap(), "Ana");
        assert_eq!(
            bounded_text("name", "   ", 2, 10).unwrap_err(),
            ValidationError::Empty { field: "name" }
        );
        assert!(matches!(
            bounded_text("name", "A", 2, 10),
            Err(ValidationError::TooShort { min: 2, .. })
        ));
        assert!(matches!(
            bounded_text("name", "abcdefghijk", 2, 10),
            Err(ValidationError::TooLong { max: 10, .. })
        ));
    }

    #[test]
    fn range_bounds_inclusive() {
        assert!(in_range("rating", 1.0, 1.0, 5.0).is_ok());
        assert!(in_range("rating", 5.0, 1.0, 5.0).is_ok());
        assert!(in_range("rating", 5.5, 1.0, 5.0).is_err());
        assert!(in_range("rating", f64::NAN, 1.0, 5.0).is_err());
    }

    #[test]
    fn negative_cents_rejected() {
        assert_eq!(non_negative_cents("total", 0).unwrap(), 0);
        assert!(non_negative_cents("total", -1).is_err());
    }
}
