//! # Protection Hook Configuration
//!
//! Settings for the concrete protection hooks. Every section of
//! [`ProtectionConfig`] is optional; an absent section means the matching hook
//! is the no-op implementation.

use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing
    pub open_timeout_ms: u64,
    /// Successful probes required to close the circuit again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_ms: 30_000,
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.failure_threshold == 0 {
            return Err(OrchestratorError::validation(
                "circuit_breaker.failure_threshold",
                "must be greater than 0",
            ));
        }
        if self.success_threshold == 0 {
            return Err(OrchestratorError::validation(
                "circuit_breaker.success_threshold",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Per-attempt timeout. Zero disables the timeout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub per_attempt_timeout_ms: u64,
}

/// Concurrency isolation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadConfig {
    pub max_concurrent_calls: usize,
    /// Zero means reject immediately when full
    pub max_wait_duration_ms: u64,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_wait_duration_ms: 0,
        }
    }
}

impl BulkheadConfig {
    /// Configuration reported by hooks that never limit concurrency
    pub fn unbounded() -> Self {
        Self {
            max_concurrent_calls: usize::MAX,
            max_wait_duration_ms: 0,
        }
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.max_concurrent_calls == 0 {
            return Err(OrchestratorError::validation(
                "bulkhead.max_concurrent_calls",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn max_wait_duration(&self) -> Duration {
        Duration::from_millis(self.max_wait_duration_ms)
    }
}

/// Token bucket settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub permits_per_second: u32,
    pub max_burst_size: u32,
    /// Zero means reject immediately when no token is available
    pub max_wait_ms: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            permits_per_second: 100,
            max_burst_size: 100,
            max_wait_ms: 0,
        }
    }
}

impl RateLimiterConfig {
    /// Configuration reported by hooks that never limit throughput
    pub fn unlimited() -> Self {
        Self {
            permits_per_second: u32::MAX,
            max_burst_size: u32::MAX,
            max_wait_ms: 0,
        }
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.permits_per_second == 0 {
            return Err(OrchestratorError::validation(
                "rate_limiter.permits_per_second",
                "must be greater than 0",
            ));
        }
        if self.max_burst_size == 0 {
            return Err(OrchestratorError::validation(
                "rate_limiter.max_burst_size",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Hedged dispatch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeConfig {
    pub hedge_delay_ms: u64,
    pub max_hedges: u32,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            hedge_delay_ms: 100,
            max_hedges: 1,
        }
    }
}

impl HedgeConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.hedge_delay_ms == 0 {
            return Err(OrchestratorError::validation(
                "hedge.hedge_delay_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Optional configuration for every protection hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Name used in logs and circuit-open errors
    pub component_name: String,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub timeout: Option<TimeoutConfig>,
    pub bulkhead: Option<BulkheadConfig>,
    pub rate_limiter: Option<RateLimiterConfig>,
    pub hedge: Option<HedgeConfig>,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            component_name: "executor".to_string(),
            circuit_breaker: None,
            timeout: None,
            bulkhead: None,
            rate_limiter: None,
            hedge: None,
        }
    }
}

impl ProtectionConfig {
    pub fn validate(&self) -> OrchestratorResult<()> {
        if let Some(config) = &self.circuit_breaker {
            config.validate()?;
        }
        if let Some(config) = &self.bulkhead {
            config.validate()?;
        }
        if let Some(config) = &self.rate_limiter {
            config.validate()?;
        }
        if let Some(config) = &self.hedge {
            config.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());
        assert!(BulkheadConfig::default().validate().is_ok());
        assert!(RateLimiterConfig::default().validate().is_ok());
        assert!(HedgeConfig::default().validate().is_ok());
        assert!(ProtectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_sections_rejected() {
        let config = ProtectionConfig {
            bulkhead: Some(BulkheadConfig {
                max_concurrent_calls: 0,
                max_wait_duration_ms: 0,
            }),
            ..ProtectionConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ProtectionConfig {
            rate_limiter: Some(RateLimiterConfig {
                permits_per_second: 0,
                ..RateLimiterConfig::default()
            }),
            ..ProtectionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
