//! Range checks for engine configuration values.
//!
//! [`validate_engine`] checks every field and reports all violations at once,
//! wrapped in [`ValidationError::Multiple`] when there is more than one.

use thiserror::Error;

use crate::engine::EngineConfig;

/// Lowest accepted sample rate in Hz.
pub const MIN_SAMPLE_RATE: f64 = 8_000.0;
/// Highest accepted sample rate in Hz.
pub const MAX_SAMPLE_RATE: f64 = 768_000.0;
/// Largest accepted block size in samples.
pub const MAX_BLOCK_SIZE: usize = 65_536;
/// Most channels accepted per direction.
pub const MAX_CHANNELS: usize = 64;
/// Shortest accepted reclaim interval in milliseconds.
pub const MIN_RECLAIM_INTERVAL_MS: u64 = 10;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Numeric value out of range.
    #[error("'{field}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the configuration field.
        field: String,
        /// The value that was out of range.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create an out-of-range error.
    pub fn out_of_range(field: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            value,
            min,
            max,
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn check(errors: &mut Vec<ValidationError>, field: &str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        errors.push(ValidationError::out_of_range(field, value, min, max));
    }
}

/// Checks every field of `config`.
pub fn validate_engine(config: &EngineConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    check(&mut errors, "sample_rate", config.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
    check(&mut errors, "block_size", config.block_size as f64, 1.0, MAX_BLOCK_SIZE as f64);
    check(&mut errors, "input_channels", config.input_channels as f64, 0.0, MAX_CHANNELS as f64);
    check(&mut errors, "output_channels", config.output_channels as f64, 0.0, MAX_CHANNELS as f64);
    check(
        &mut errors,
        "reclaim_interval_ms",
        config.reclaim_interval_ms as f64,
        MIN_RECLAIM_INTERVAL_MS as f64,
        f64::MAX,
    );
    check(&mut errors, "event_capacity", config.event_capacity as f64, 1.0, f64::MAX);

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
