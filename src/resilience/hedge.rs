//! Hedged dispatch: when a dispatch is slow, issue duplicate dispatches and
//! take whichever succeeds first.

use super::HedgeConfig;
use crate::models::Envelope;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Hedging hook
pub trait HedgePolicy: Send + Sync + 'static {
    fn should_hedge(&self, envelope: &Envelope) -> bool;

    /// Delay before each additional dispatch
    fn hedge_delay(&self) -> Duration;

    fn max_hedges(&self) -> u32;

    fn record_hedge_attempt(&self);

    /// Called once per dispatch with whether the winning call was a hedge
    fn record_success(&self, was_hedge: bool);
}

/// Policy that never hedges
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHedgePolicy;

impl HedgePolicy for NoOpHedgePolicy {
    fn should_hedge(&self, _envelope: &Envelope) -> bool {
        false
    }

    fn hedge_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn max_hedges(&self) -> u32 {
        0
    }

    fn record_hedge_attempt(&self) {}

    fn record_success(&self, _was_hedge: bool) {}
}

/// Hedges every dispatch after a fixed delay, up to `max_hedges` times
#[derive(Debug, Default)]
pub struct FixedDelayHedgePolicy {
    config: HedgeConfig,
    hedge_attempts: AtomicU64,
    primary_wins: AtomicU64,
    hedge_wins: AtomicU64,
}

impl FixedDelayHedgePolicy {
    pub fn new(config: HedgeConfig) -> Self {
        Self {
            config,
            hedge_attempts: AtomicU64::new(0),
            primary_wins: AtomicU64::new(0),
            hedge_wins: AtomicU64::new(0),
        }
    }

    pub fn hedge_attempts(&self) -> u64 {
        self.hedge_attempts.load(Ordering::Relaxed)
    }

    pub fn primary_wins(&self) -> u64 {
        self.primary_wins.load(Ordering::Relaxed)
    }

    pub fn hedge_wins(&self) -> u64 {
        self.hedge_wins.load(Ordering::Relaxed)
    }
}

impl HedgePolicy for FixedDelayHedgePolicy {
    fn should_hedge(&self, _envelope: &Envelope) -> bool {
        self.config.max_hedges > 0
    }

    fn hedge_delay(&self) -> Duration {
        Duration::from_millis(self.config.hedge_delay_ms)
    }

    fn max_hedges(&self) -> u32 {
        self.config.max_hedges
    }

    fn record_hedge_attempt(&self) {
        self.hedge_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success(&self, was_hedge: bool) {
        if was_hedge {
            self.hedge_wins.fetch_add(1, Ordering::Relaxed);
        } else {
            self.primary_wins.fetch_add(1, Ordering::Relaxed);
        }
    }
}
