//! RSI Alert Configuration Domain Value Object
//!
//! Thresholds, period and cooldown used by the alert dispatcher, validated on construction.

use std::time::Duration;
use thiserror::Error;

/// Error type for RsiAlertConfig validation
#[derive(Debug, Error, PartialEq)]
pub enum AlertConfigError {
    #[error("Invalid RSI period: {0}. Must be at least 1")]
    InvalidPeriod(usize),

    #[error("Invalid threshold: {field} = {value}. Must be between 0 and 100")]
    ThresholdOutOfRange { field: String, value: f64 },

    #[error("Lower threshold {lower} must be below upper threshold {upper}")]
    InvertedBand { lower: f64, upper: f64 },
}

/// RSI alerting parameters
///
/// # Invariants
///
/// - `period >= 1`
/// - `0 <= lower_threshold < upper_threshold <= 100`
#[derive(Debug, Clone, PartialEq)]
pub struct RsiAlertConfig {
    pub period: usize,

    /// Overbought level: alert when RSI is strictly above it
    pub upper_threshold: f64,

    /// Oversold level: alert when RSI is strictly below it
    pub lower_threshold: f64,

    /// Minimum time between two dispatched alerts for the same symbol
    pub cooldown: Duration,
}

impl RsiAlertConfig {
    pub fn new(
        period: usize,
        upper_threshold: f64,
        lower_threshold: f64,
        cooldown: Duration,
    ) -> Result<Self, AlertConfigError> {
        let config = Self {
            period,
            upper_threshold,
            lower_threshold,
            cooldown,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AlertConfigError> {
        if self.period == 0 {
            return Err(AlertConfigError::InvalidPeriod(self.period));
        }

        for (field, value) in [
            ("upper_threshold", self.upper_threshold),
            ("lower_threshold", self.lower_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(AlertConfigError::ThresholdOutOfRange {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.lower_threshold >= self.upper_threshold {
            return Err(AlertConfigError::InvertedBand {
                lower: self.lower_threshold,
                upper: self.upper_threshold,
            });
        }

        Ok(())
    }

    /// Candles required before an RSI value exists
    pub fn min_history(&self) -> usize {
        self.period + 1
    }
}

impl Default for RsiAlertConfig {
    fn default() -> Self {
        Self {
            period: 14,
            upper_threshold: 67.0,
            lower_threshold: 23.0,
            cooldown: Duration::from_secs(5 * 60),
        }
    }
}
