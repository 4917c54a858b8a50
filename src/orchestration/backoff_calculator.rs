//! # Backoff Calculator
//!
//! Exponential backoff with jitter for retried operations.
//!
//! ## Overview
//!
//! For attempt `n >= 1` the delay is
//!
//! ```text
//! exponential = min(base * 2^(n-1), max)
//! delay       = min(exponential + uniform(0, exponential * jitter), max)
//! ```
//!
//! ## Key Features
//!
//! - **Exponential Backoff**: Configurable base delay doubling per attempt
//! - **Jitter Support**: Proportional randomization to prevent thundering herd
//! - **Maximum Delay Caps**: The cap applies before and after jitter
//! - **Overflow Safety**: Exponent overflow saturates to the cap

use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for backoff calculation behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds
    pub max_delay_ms: u64,
    /// Maximum jitter as a fraction of the exponential delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 300_000, // 5 minutes
            jitter_factor: 0.1,    // 10% jitter
        }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.base_delay_ms == 0 {
            return Err(OrchestratorError::validation(
                "base_delay_ms",
                "must be greater than 0",
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(OrchestratorError::validation(
                "max_delay_ms",
                format!(
                    "must be at least base_delay_ms ({}), got {}",
                    self.base_delay_ms, self.max_delay_ms
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(OrchestratorError::validation(
                "jitter_factor",
                format!("must be between 0.0 and 1.0, got {}", self.jitter_factor),
            ));
        }
        Ok(())
    }
}

/// Computes retry delays. Stateless apart from its configuration.
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    config: BackoffConfig,
}

impl BackoffCalculator {
    /// Create a calculator, rejecting invalid parameters eagerly
    pub fn new(
        base_delay_ms: u64,
        max_delay_ms: u64,
        jitter_factor: f64,
    ) -> OrchestratorResult<Self> {
        Self::from_config(BackoffConfig {
            base_delay_ms,
            max_delay_ms,
            jitter_factor,
        })
    }

    pub fn from_config(config: BackoffConfig) -> OrchestratorResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Jitter-free component `min(base * 2^(n-1), max)`
    pub fn exponential_delay_ms(&self, attempt: u32) -> OrchestratorResult<u64> {
        if attempt == 0 {
            return Err(OrchestratorError::validation(
                "attempt",
                "must be at least 1",
            ));
        }
        let exponential = 1u64
            .checked_shl(attempt - 1)
            .and_then(|factor| self.config.base_delay_ms.checked_mul(factor))
            .unwrap_or(self.config.max_delay_ms);
        Ok(exponential.min(self.config.max_delay_ms))
    }

    /// Delay before the given retry attempt, in milliseconds
    pub fn calculate(&self, attempt: u32) -> OrchestratorResult<u64> {
        let exponential = self.exponential_delay_ms(attempt)?;

        let jitter = if self.config.jitter_factor > 0.0 {
            let range = exponential as f64 * self.config.jitter_factor;
            (fastrand::f64() * range) as u64
        } else {
            0
        };

        Ok(exponential
            .saturating_add(jitter)
            .min(self.config.max_delay_ms))
    }

    pub fn calculate_duration(&self, attempt: u32) -> OrchestratorResult<Duration> {
        self.calculate(attempt).map(Duration::from_millis)
    }
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self {
            config: BackoffConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_within_jitter_window() {
        let calculator = BackoffCalculator::new(1_000, 300_000, 0.1).unwrap();
        for _ in 0..200 {
            let delay = calculator.calculate(1).unwrap();
            assert!((1_000..=1_100).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_large_attempt_is_capped() {
        let calculator = BackoffCalculator::new(1_000, 300_000, 0.1).unwrap();
        assert_eq!(calculator.calculate(10).unwrap(), 300_000);
        assert_eq!(calculator.calculate(64).unwrap(), 300_000);
        assert_eq!(calculator.calculate(u32::MAX).unwrap(), 300_000);
    }

    #[test]
    fn test_no_jitter_is_deterministic() {
        let calculator = BackoffCalculator::new(100, 10_000, 0.0).unwrap();
        assert_eq!(calculator.calculate(1).unwrap(), 100);
        assert_eq!(calculator.calculate(2).unwrap(), 200);
        assert_eq!(calculator.calculate(3).unwrap(), 400);
        assert_eq!(calculator.calculate(8).unwrap(), 10_000);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(BackoffCalculator::new(0, 1_000, 0.1).is_err());
        assert!(BackoffCalculator::new(1_000, 999, 0.1).is_err());
        assert!(BackoffCalculator::new(1_000, 1_000, -0.1).is_err());
        assert!(BackoffCalculator::new(1_000, 1_000, 1.1).is_err());
        assert!(BackoffCalculator::new(1_000, 1_000, f64::NAN).is_err());
    }

    #[test]
    fn test_rejects_attempt_zero() {
        let calculator = BackoffCalculator::default();
        assert!(calculator.calculate(0).is_err());
    }
}
