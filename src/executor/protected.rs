//! # Protected Executor
//!
//! Wraps any [`Executor`] and applies the protection hooks around `execute`
//! in a fixed order:
//!
//! ```text
//! Timeout -> CircuitBreaker -> Bulkhead -> RateLimiter -> Hedge -> Executor
//! ```
//!
//! One bulkhead permit and one rate-limiter token cover the primary dispatch
//! and all of its hedges. State and outcome queries pass straight through.

use super::Executor;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::metrics;
use crate::models::{Envelope, OpId, Outcome};
use crate::resilience::{Bulkhead, CircuitBreaker, ProtectionHooks};
use crate::state_machine::OperationState;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use opentelemetry::KeyValue;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Records a circuit breaker failure unless the call settles first.
/// A dispatch cancelled by the timeout counts as a failure.
struct CircuitCall {
    breaker: Arc<dyn CircuitBreaker>,
    settled: bool,
}

impl CircuitCall {
    fn new(breaker: Arc<dyn CircuitBreaker>) -> Self {
        Self {
            breaker,
            settled: false,
        }
    }

    fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    /// Local rejection further down the chain; not an executor failure.
    /// The acquired permit goes back unused.
    fn abandon(mut self) {
        self.settled = true;
        self.breaker.release_probe();
    }
}

impl Drop for CircuitCall {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record_failure();
        }
    }
}

/// Bulkhead permit returned on drop
struct BulkheadPermit(Arc<dyn Bulkhead>);

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Executor decorator applying [`ProtectionHooks`]
pub struct ProtectedExecutor {
    inner: Arc<dyn Executor>,
    hooks: ProtectionHooks,
}

impl fmt::Debug for ProtectedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedExecutor")
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl ProtectedExecutor {
    pub fn new(inner: Arc<dyn Executor>, hooks: ProtectionHooks) -> Self {
        Self { inner, hooks }
    }

    /// Wrap with no-op hooks
    pub fn unprotected(inner: Arc<dyn Executor>) -> Self {
        Self::new(inner, ProtectionHooks::default())
    }

    pub fn hooks(&self) -> &ProtectionHooks {
        &self.hooks
    }

    fn rejected(
        &self,
        envelope: &Envelope,
        hook: &'static str,
        error: OrchestratorError,
    ) -> OrchestratorError {
        warn!(
            op_id = %envelope.op_id,
            component = %self.hooks.component,
            hook = hook,
            "🛑 Dispatch rejected by protection hook"
        );
        metrics::protection_rejections_total().add(1, &[KeyValue::new("hook", hook)]);
        error
    }

    /// Everything inside the timeout
    async fn guarded_dispatch(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        let hooks = &self.hooks;

        if !hooks.circuit_breaker.try_acquire() {
            return Err(self.rejected(
                envelope,
                "circuit_breaker",
                OrchestratorError::CircuitOpen {
                    component: hooks.component.clone(),
                },
            ));
        }
        let call = CircuitCall::new(Arc::clone(&hooks.circuit_breaker));

        let bulkhead_config = hooks.bulkhead.config();
        let wait = bulkhead_config.max_wait_duration();
        let admitted = if wait.is_zero() {
            hooks.bulkhead.try_acquire()
        } else {
            hooks.bulkhead.try_acquire_for(wait).await
        };
        if !admitted {
            call.abandon();
            return Err(self.rejected(
                envelope,
                "bulkhead",
                OrchestratorError::BulkheadFull {
                    max_concurrent_calls: bulkhead_config.max_concurrent_calls,
                },
            ));
        }
        let _permit = BulkheadPermit(Arc::clone(&hooks.bulkhead));

        let rate_config = hooks.rate_limiter.config();
        let wait = rate_config.max_wait();
        let admitted = if wait.is_zero() {
            hooks.rate_limiter.try_acquire()
        } else {
            hooks.rate_limiter.try_acquire_for(wait).await
        };
        if !admitted {
            call.abandon();
            return Err(self.rejected(
                envelope,
                "rate_limiter",
                OrchestratorError::RateLimited {
                    permits_per_second: rate_config.permits_per_second,
                },
            ));
        }

        let result = self.dispatch_with_hedging(envelope).await;
        match &result {
            Ok(()) => call.success(),
            Err(_) => call.failure(),
        }
        result
    }

    fn dispatch_attempt<'a>(
        &self,
        envelope: &'a Envelope,
        was_hedge: bool,
    ) -> BoxFuture<'a, (bool, OrchestratorResult<()>)> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { (was_hedge, inner.execute(envelope).await) })
    }

    /// Race the primary dispatch against delayed hedges; first success wins.
    /// A failure only surfaces once no other attempt is still running.
    async fn dispatch_with_hedging(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        let hedge = &self.hooks.hedge;
        let max_hedges = hedge.max_hedges();
        if max_hedges == 0 || !hedge.should_hedge(envelope) {
            return self.inner.execute(envelope).await;
        }

        let delay = hedge.hedge_delay();
        let mut attempts = FuturesUnordered::new();
        attempts.push(self.dispatch_attempt(envelope, false));
        let mut hedges_launched = 0u32;

        loop {
            let can_hedge = hedges_launched < max_hedges;
            tokio::select! {
                finished = attempts.next() => match finished {
                    Some((was_hedge, Ok(()))) => {
                        hedge.record_success(was_hedge);
                        debug!(op_id = %envelope.op_id, was_hedge, "Dispatch accepted");
                        return Ok(());
                    }
                    Some((_, Err(err))) => {
                        if attempts.is_empty() {
                            return Err(err);
                        }
                    }
                    None => {
                        return Err(OrchestratorError::internal(
                            "hedged dispatch ran out of attempts",
                        ));
                    }
                },
                _ = tokio::time::sleep(delay), if can_hedge => {
                    hedges_launched += 1;
                    hedge.record_hedge_attempt();
                    debug!(
                        op_id = %envelope.op_id,
                        hedge = hedges_launched,
                        "🔀 Launching hedged dispatch"
                    );
                    attempts.push(self.dispatch_attempt(envelope, true));
                }
            }
        }
    }
}

#[async_trait]
impl Executor for ProtectedExecutor {
    async fn execute(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        match self.hooks.timeout.per_attempt_timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.guarded_dispatch(envelope))
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    self.hooks.timeout.record_timeout();
                    Err(self.rejected(
                        envelope,
                        "timeout",
                        OrchestratorError::AttemptTimeout {
                            timeout_ms: limit.as_millis() as u64,
                        },
                    ))
                }
            },
            None => self.guarded_dispatch(envelope).await,
        }
    }

    async fn get_state(&self, op_id: &OpId) -> OrchestratorResult<OperationState> {
        self.inner.get_state(op_id).await
    }

    async fn get_outcome(&self, op_id: &OpId) -> OrchestratorResult<Outcome> {
        self.inner.get_outcome(op_id).await
    }

    fn completion_signal(&self, op_id: &OpId) -> Option<watch::Receiver<OperationState>> {
        self.inner.completion_signal(op_id)
    }
}
