//! # Resilience Module
//!
//! Protection hooks guarding every dispatch to an
//! [`Executor`](crate::executor::Executor).
//!
//! ## Architecture
//!
//! - **Timeout**: Per-attempt time budget around the whole chain
//! - **Circuit Breaker**: Fails fast while the executor is unhealthy
//! - **Bulkhead**: Caps concurrent dispatches
//! - **Rate Limiter**: Token bucket throughput limit
//! - **Hedging**: Duplicate dispatch when the first one is slow
//!
//! Every hook is a trait with a `NoOp` default so hosts only pay for what they
//! configure. [`ProtectionHooks`] bundles them and
//! [`ProtectedExecutor`](crate::executor::ProtectedExecutor) applies them in order.
//!
//! ## Usage
//!
//! ```rust
//! use orchestrator_core::resilience::{
//!     CircuitBreaker, CircuitBreakerConfig, CircuitState, FailureThresholdCircuitBreaker,
//! };
//!
//! let breaker = FailureThresholdCircuitBreaker::new(
//!     "payments",
//!     CircuitBreakerConfig {
//!         failure_threshold: 2,
//!         open_timeout_ms: 30_000,
//!         success_threshold: 1,
//!     },
//! );
//!
//! assert!(breaker.try_acquire());
//! breaker.record_failure();
//! breaker.record_failure();
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(!breaker.try_acquire());
//! ```

pub mod bulkhead;
pub mod circuit_breaker;
pub mod config;
pub mod hedge;
pub mod hooks;
pub mod metrics;
pub mod rate_limiter;
pub mod timeout;

pub use bulkhead::{Bulkhead, NoOpBulkhead, SemaphoreBulkhead};
pub use circuit_breaker::{
    CircuitBreaker, CircuitState, FailureThresholdCircuitBreaker, NoOpCircuitBreaker,
};
pub use config::{
    BulkheadConfig, CircuitBreakerConfig, HedgeConfig, ProtectionConfig, RateLimiterConfig,
    TimeoutConfig,
};
pub use hedge::{FixedDelayHedgePolicy, HedgePolicy, NoOpHedgePolicy};
pub use hooks::ProtectionHooks;
pub use metrics::CircuitBreakerMetrics;
pub use rate_limiter::{NoOpRateLimiter, RateLimiter, TokenBucketRateLimiter};
pub use timeout::{FixedTimeoutPolicy, NoOpTimeoutPolicy, TimeoutPolicy};
