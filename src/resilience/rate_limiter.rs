//! Token-bucket rate limiting for executor dispatch.

use super::RateLimiterConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Throughput limiting hook
#[async_trait]
pub trait RateLimiter: Send + Sync + 'static {
    /// Take a token without waiting
    fn try_acquire(&self) -> bool;

    /// Take a token, waiting at most `timeout`
    async fn try_acquire_for(&self, timeout: Duration) -> bool;

    fn config(&self) -> RateLimiterConfig;
}

/// Limiter that always grants
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpRateLimiter;

#[async_trait]
impl RateLimiter for NoOpRateLimiter {
    fn try_acquire(&self) -> bool {
        true
    }

    async fn try_acquire_for(&self, _timeout: Duration) -> bool {
        true
    }

    fn config(&self) -> RateLimiterConfig {
        RateLimiterConfig::unlimited()
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket refilled continuously at `permits_per_second`, holding at
/// most `max_burst_size` tokens. Starts full.
#[derive(Debug)]
pub struct TokenBucketRateLimiter {
    config: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl TokenBucketRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: f64::from(config.max_burst_size),
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * f64::from(self.config.permits_per_second))
            .min(f64::from(self.config.max_burst_size));
        bucket.last_refill = now;
    }

    /// Take a token, or report how long until one is available
    fn acquire_or_wait_time(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(
                missing / f64::from(self.config.permits_per_second),
            ))
        }
    }

    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens
    }
}

#[async_trait]
impl RateLimiter for TokenBucketRateLimiter {
    fn try_acquire(&self) -> bool {
        let acquired = self.acquire_or_wait_time().is_ok();
        if !acquired {
            debug!(
                permits_per_second = self.config.permits_per_second,
                "🚦 Rate limit reached"
            );
        }
        acquired
    }

    async fn try_acquire_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.acquire_or_wait_time() {
                Ok(()) => return true,
                Err(wait) => {
                    let now = Instant::now();
                    if now >= deadline || now + wait > deadline {
                        return false;
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn config(&self) -> RateLimiterConfig {
        self.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(permits_per_second: u32, max_burst_size: u32) -> TokenBucketRateLimiter {
        TokenBucketRateLimiter::new(RateLimiterConfig {
            permits_per_second,
            max_burst_size,
            max_wait_ms: 0,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_reject() {
        let limiter = limiter(10, 3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let limiter = limiter(10, 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_wait() {
        let limiter = limiter(10, 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire_for(Duration::from_millis(50)).await);
        assert!(limiter.try_acquire_for(Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn test_noop_always_grants() {
        let limiter = NoOpRateLimiter;
        for _ in 0..10_000 {
            assert!(limiter.try_acquire());
        }
        assert!(limiter.try_acquire_for(Duration::ZERO).await);
    }
}
