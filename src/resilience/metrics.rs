//! Counters kept by [`FailureThresholdCircuitBreaker`](super::FailureThresholdCircuitBreaker).

use super::CircuitState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of one breaker's call history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Dispatches whose result was recorded
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Dispatches refused while open or after the half-open probe budget
    pub rejected_count: u64,
    pub consecutive_failures: u64,
    /// Probes admitted in the current half-open cycle
    pub half_open_calls: u64,
    pub half_open_successes: u64,
    pub current_state: CircuitState,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of recorded calls that failed, 0.0 with no history
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.failure_count as f64 / self.total_calls as f64
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_calls as f64
    }
}

impl fmt::Display for CircuitBreakerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | calls={} ok={:.1}% failed={} rejected={}",
            self.current_state,
            self.total_calls,
            self.success_rate() * 100.0,
            self.failure_count,
            self.rejected_count
        )
    }
}
