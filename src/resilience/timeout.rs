//! Per-attempt timeout budgets.

use super::TimeoutConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Timeout hook applied around the whole protected dispatch
pub trait TimeoutPolicy: Send + Sync + 'static {
    /// Budget for one attempt; `None` means unbounded
    fn per_attempt_timeout(&self) -> Option<Duration>;

    fn record_timeout(&self);
}

/// Policy without a timeout
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTimeoutPolicy;

impl TimeoutPolicy for NoOpTimeoutPolicy {
    fn per_attempt_timeout(&self) -> Option<Duration> {
        None
    }

    fn record_timeout(&self) {}
}

/// Fixed per-attempt budget. A zero budget disables the timeout.
#[derive(Debug, Default)]
pub struct FixedTimeoutPolicy {
    timeout_ms: u64,
    timeouts: AtomicU64,
}

impl FixedTimeoutPolicy {
    pub fn new(config: &TimeoutConfig) -> Self {
        Self {
            timeout_ms: config.per_attempt_timeout_ms,
            timeouts: AtomicU64::new(0),
        }
    }

    pub fn timeout_count(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }
}

impl TimeoutPolicy for FixedTimeoutPolicy {
    fn per_attempt_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    fn record_timeout(&self) {
        let count = self.timeouts.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(timeout_ms = self.timeout_ms, total_timeouts = count, "⏱️ Attempt timed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_means_unbounded() {
        let policy = FixedTimeoutPolicy::new(&TimeoutConfig {
            per_attempt_timeout_ms: 0,
        });
        assert_eq!(policy.per_attempt_timeout(), None);
        assert_eq!(NoOpTimeoutPolicy.per_attempt_timeout(), None);
    }

    #[test]
    fn test_fixed_timeout_counts() {
        let policy = FixedTimeoutPolicy::new(&TimeoutConfig {
            per_attempt_timeout_ms: 250,
        });
        assert_eq!(policy.per_attempt_timeout(), Some(Duration::from_millis(250)));
        policy.record_timeout();
        policy.record_timeout();
        assert_eq!(policy.timeout_count(), 2);
    }
}
