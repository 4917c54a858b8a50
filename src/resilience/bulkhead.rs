//! # Bulkhead
//!
//! Caps the number of concurrent executor dispatches. Permits are acquired
//! and released explicitly so the protected executor can hold them across
//! the rest of the chain.

use super::BulkheadConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

/// Concurrency isolation hook
#[async_trait]
pub trait Bulkhead: Send + Sync + 'static {
    /// Take a permit without waiting
    fn try_acquire(&self) -> bool;

    /// Take a permit, waiting at most `timeout`
    async fn try_acquire_for(&self, timeout: Duration) -> bool;

    /// Return a permit taken by a successful acquire
    fn release(&self);

    fn current_concurrency(&self) -> usize;

    fn config(&self) -> BulkheadConfig;
}

/// Bulkhead without a limit
#[derive(Debug, Default)]
pub struct NoOpBulkhead {
    in_flight: AtomicUsize,
}

#[async_trait]
impl Bulkhead for NoOpBulkhead {
    fn try_acquire(&self) -> bool {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        true
    }

    async fn try_acquire_for(&self, _timeout: Duration) -> bool {
        self.try_acquire()
    }

    fn release(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    fn current_concurrency(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    fn config(&self) -> BulkheadConfig {
        BulkheadConfig::unbounded()
    }
}

/// Semaphore-backed bulkhead
#[derive(Debug)]
pub struct SemaphoreBulkhead {
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
    in_flight: AtomicUsize,
}

impl SemaphoreBulkhead {
    pub fn new(config: BulkheadConfig) -> Self {
        let permits = config.max_concurrent_calls.min(Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl Bulkhead for SemaphoreBulkhead {
    fn try_acquire(&self) -> bool {
        match self.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.in_flight.fetch_add(1, Ordering::AcqRel);
                true
            }
            Err(_) => {
                debug!(
                    max_concurrent_calls = self.config.max_concurrent_calls,
                    "🚧 Bulkhead full"
                );
                false
            }
        }
    }

    async fn try_acquire_for(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                self.in_flight.fetch_add(1, Ordering::AcqRel);
                true
            }
            _ => false,
        }
    }

    fn release(&self) {
        if self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
        {
            self.semaphore.add_permits(1);
        }
    }

    fn current_concurrency(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn config(&self) -> BulkheadConfig {
        self.config.clone()
    }
}
