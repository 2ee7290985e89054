//! Shared range-checking helpers.
//!
//! Used by the factor, test-data and request validation paths so every
//! numeric input is rejected with the same message shape.

use crate::error::CoreError;

/// Validate that a value is finite and `>= 0.0`.
pub fn validate_non_negative(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::Validation(format!(
            "{name} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a value is finite and strictly positive.
pub fn validate_positive(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::Validation(format!(
            "{name} must be greater than 0, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a value is a percentage in `[0.0, 100.0]`.
pub fn validate_percent(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a batch size lies in `1..=max`.
pub fn validate_count_range(count: usize, max: usize, label: &str) -> Result<(), CoreError> {
    if count == 0 {
        return Err(CoreError::Validation(format!(
            "{label} requires at least one item"
        )));
    }
    if count > max {
        return Err(CoreError::Validation(format!(
            "{label} accepts at most {max} items, got {count}"
        )));
    }
    Ok(())
}
