//! # Circuit Breaker Implementation
//!
//! Fault isolation for executor dispatch. Follows the classic circuit breaker
//! pattern with three states: Closed (normal operation), Open (failing fast),
//! and Half-Open (testing recovery).

use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    #[default]
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - limited calls allowed to test system health
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker hook guarding executor dispatch
pub trait CircuitBreaker: Send + Sync + 'static {
    /// Ask for permission to call; false means fail fast
    fn try_acquire(&self) -> bool;

    fn record_success(&self);

    fn record_failure(&self);

    /// Hand back a permit from `try_acquire` that never reached the
    /// dependency, so a half-open probe slot is not lost
    fn release_probe(&self);

    fn state(&self) -> CircuitState;

    /// Return to `Closed` and forget failure history
    fn reset(&self);
}

/// Breaker that never trips
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCircuitBreaker;

impl CircuitBreaker for NoOpCircuitBreaker {
    fn try_acquire(&self) -> bool {
        true
    }

    fn record_success(&self) {}

    fn record_failure(&self) {}

    fn release_probe(&self) {}

    fn state(&self) -> CircuitState {
        CircuitState::Closed
    }

    fn reset(&self) {}
}

#[derive(Debug)]
struct BreakerInner {
    metrics: CircuitBreakerMetrics,
    /// Time when circuit was opened (for timeout calculations)
    opened_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker with atomic state reads
#[derive(Debug)]
pub struct FailureThresholdCircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    /// Current circuit state (atomic for lock-free reads)
    state: AtomicU8,

    config: CircuitBreakerConfig,

    /// Metrics and open timestamp; every transition happens under this lock
    inner: Mutex<BreakerInner>,
}

impl FailureThresholdCircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            open_timeout_ms = config.open_timeout_ms,
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            inner: Mutex::new(BreakerInner {
                metrics: CircuitBreakerMetrics::new(),
                opened_at: None,
            }),
        }
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn current_state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Transition to closed state (normal operation)
    fn transition_to_closed(&self, inner: &mut BreakerInner) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
        inner.metrics.consecutive_failures = 0;
        inner.metrics.half_open_calls = 0;
        inner.metrics.half_open_successes = 0;
        inner.opened_at = None;

        info!(
            component = %self.name,
            total_calls = inner.metrics.total_calls,
            "🟢 Circuit breaker closed (recovered)"
        );
    }

    /// Transition to open state (failing fast)
    fn transition_to_open(&self, inner: &mut BreakerInner) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        inner.opened_at = Some(Instant::now());
        inner.metrics.half_open_calls = 0;
        inner.metrics.half_open_successes = 0;

        error!(
            component = %self.name,
            consecutive_failures = inner.metrics.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            open_timeout_ms = self.config.open_timeout_ms,
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    /// Transition to half-open state (testing recovery)
    fn transition_to_half_open(&self, inner: &mut BreakerInner) {
        self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
        inner.metrics.half_open_calls = 0;
        inner.metrics.half_open_successes = 0;

        info!(
            component = %self.name,
            success_threshold = self.config.success_threshold,
            "🟡 Circuit breaker half-open (testing recovery)"
        );
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        let mut inner = self.inner.lock();
        self.transition_to_open(&mut inner);
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        let mut inner = self.inner.lock();
        self.transition_to_closed(&mut inner);
    }

    /// Metrics snapshot including the current state
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let mut snapshot = self.inner.lock().metrics.clone();
        snapshot.current_state = self.current_state();
        snapshot
    }

    /// Closed, and failing less than one call in ten once there is enough history
    pub fn is_healthy(&self) -> bool {
        if self.current_state() != CircuitState::Closed {
            return false;
        }
        let metrics = self.metrics();
        metrics.total_calls < 10 || metrics.failure_rate() < 0.1
    }
}

impl CircuitBreaker for FailureThresholdCircuitBreaker {
    fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();

        if self.current_state() == CircuitState::Open {
            let timed_out = inner
                .opened_at
                .map_or(true, |opened| opened.elapsed() >= self.config.open_timeout());
            if !timed_out {
                inner.metrics.rejected_count += 1;
                debug!(component = %self.name, "⛔ Call rejected, circuit open");
                return false;
            }
            self.transition_to_half_open(&mut inner);
        }

        match self.current_state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.metrics.half_open_calls < u64::from(self.config.success_threshold) {
                    inner.metrics.half_open_calls += 1;
                    true
                } else {
                    inner.metrics.rejected_count += 1;
                    false
                }
            }
            CircuitState::Open => false,
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.success_count += 1;

        match self.current_state() {
            CircuitState::HalfOpen => {
                inner.metrics.half_open_successes += 1;
                if inner.metrics.half_open_successes >= u64::from(self.config.success_threshold) {
                    self.transition_to_closed(&mut inner);
                }
            }
            CircuitState::Closed => {
                // Reset failure count on success
                inner.metrics.consecutive_failures = 0;
            }
            CircuitState::Open => {
                warn!(component = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.failure_count += 1;
        inner.metrics.consecutive_failures += 1;

        match self.current_state() {
            CircuitState::Closed => {
                if inner.metrics.consecutive_failures >= u64::from(self.config.failure_threshold) {
                    self.transition_to_open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state immediately opens circuit
                self.transition_to_open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    fn release_probe(&self) {
        let mut inner = self.inner.lock();
        if self.current_state() == CircuitState::HalfOpen {
            inner.metrics.half_open_calls = inner.metrics.half_open_calls.saturating_sub(1);
            debug!(component = %self.name, "Half-open probe slot released unused");
        }
    }

    fn state(&self) -> CircuitState {
        self.current_state()
    }

    fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.metrics = CircuitBreakerMetrics::new();
        self.transition_to_closed(&mut inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker(
        failure_threshold: u32,
        open_timeout_ms: u64,
        success_threshold: u32,
    ) -> FailureThresholdCircuitBreaker {
        FailureThresholdCircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                open_timeout_ms,
                success_threshold,
            },
        )
    }

    #[test]
    fn test_circuit_breaker_normal_operation() {
        let circuit = breaker(3, 100, 2);
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert!(circuit.try_acquire());
        circuit.record_success();

        let metrics = circuit.metrics();
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.failure_count, 0);
    }

    #[test]
    fn test_circuit_breaker_opens_on_failures() {
        let circuit = breaker(2, 10_000, 2);
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Closed);
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);

        assert!(!circuit.try_acquire());
        assert_eq!(circuit.metrics().rejected_count, 1);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let circuit = breaker(2, 10_000, 1);
        circuit.record_failure();
        circuit.record_success();
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_breaker_recovery() {
        let circuit = breaker(1, 50, 1);
        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(circuit.try_acquire());
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        circuit.record_success();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let circuit = breaker(1, 50, 2);
        circuit.record_failure();
        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(circuit.try_acquire());
        assert!(circuit.try_acquire());
        // Probe budget exhausted
        assert!(!circuit.try_acquire());

        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_probe_can_be_reacquired() {
        let circuit = breaker(1, 50, 1);
        circuit.record_failure();
        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(circuit.try_acquire());
        assert!(!circuit.try_acquire());

        circuit.release_probe();
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        assert!(circuit.try_acquire());
        circuit.record_success();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn test_release_probe_outside_half_open_is_ignored() {
        let circuit = breaker(3, 1_000, 1);
        circuit.release_probe();
        assert_eq!(circuit.metrics().half_open_calls, 0);
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn test_force_operations_and_reset() {
        let circuit = breaker(1, 1_000, 1);
        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);
        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);

        circuit.record_failure();
        assert_eq!(circuit.state(), CircuitState::Open);
        circuit.reset();
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.metrics().failure_count, 0);
        assert!(circuit.is_healthy());
    }

    #[test]
    fn test_noop_never_trips() {
        let circuit = NoOpCircuitBreaker;
        for _ in 0..100 {
            circuit.record_failure();
        }
        assert!(circuit.try_acquire());
        assert_eq!(circuit.state(), CircuitState::Closed);
    }
}
