//! Configuration errors

use thiserror::Error;

use crate::features::MAX_SAMPLE_RATE;

/// Rejected estimator configuration
///
/// Invalid values are never clamped. The estimator keeps its previous
/// configuration when a setter fails.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("Invalid sample rate: {0} Hz (must be positive and at most {max} Hz)", max = MAX_SAMPLE_RATE)]
    InvalidSampleRate(f32),
    #[error("Invalid tempo range: {min}-{max} BPM (need 0 < min < max)")]
    InvalidTempoRange { min: f64, max: f64 },
    #[error("Invalid beats per bar: {0} (must be at least 1)")]
    InvalidBeatsPerBar(u32),
}

/// Check that frames can be sized for `sample_rate`
pub fn validate_sample_rate(sample_rate: f32) -> Result<(), ConfigError> {
    if sample_rate.is_finite() && sample_rate > 0.0 && sample_rate <= MAX_SAMPLE_RATE {
        Ok(())
    } else {
        Err(ConfigError::InvalidSampleRate(sample_rate))
    }
}

/// Check a BPM search range without applying it
pub fn validate_tempo_range(min: f64, max: f64) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min > 0.0 && min < max {
        Ok(())
    } else {
        Err(ConfigError::InvalidTempoRange { min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_range() {
        assert!(validate_tempo_range(55.0, 190.0).is_ok());
        assert!(validate_tempo_range(0.5, 0.6).is_ok());
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(validate_tempo_range(120.0, 120.0).is_err());
        assert!(validate_tempo_range(140.0, 100.0).is_err());
        assert!(validate_tempo_range(0.0, 100.0).is_err());
        assert!(validate_tempo_range(-10.0, 100.0).is_err());
        assert!(validate_tempo_range(60.0, f64::INFINITY).is_err());
        assert!(validate_tempo_range(f64::NAN, 100.0).is_err());
    }

    #[test]
    fn test_sample_rate_limits() {
        assert!(validate_sample_rate(44100.0).is_ok());
        assert!(validate_sample_rate(MAX_SAMPLE_RATE).is_ok());
        assert!(validate_sample_rate(0.0).is_err());
        assert!(validate_sample_rate(1.0e30).is_err());
        assert!(validate_sample_rate(f32::NAN).is_err());
    }

    #[test]
    fn test_error_message() {
        let err = ConfigError::InvalidTempoRange {
            min: 140.0,
            max: 100.0,
        };
        assert!(err.to_string().contains("140-100"));
    }
}
