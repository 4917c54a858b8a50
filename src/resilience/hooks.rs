use super::{
    Bulkhead, CircuitBreaker, FailureThresholdCircuitBreaker, FixedDelayHedgePolicy,
    FixedTimeoutPolicy, HedgePolicy, NoOpBulkhead, NoOpCircuitBreaker, NoOpHedgePolicy,
    NoOpRateLimiter, NoOpTimeoutPolicy, ProtectionConfig, RateLimiter, SemaphoreBulkhead,
    TimeoutPolicy, TokenBucketRateLimiter,
};
use crate::error::OrchestratorResult;
use std::fmt;
use std::sync::Arc;

/// The full set of protection hooks applied around executor dispatch.
///
/// Composition order is fixed: timeout, circuit breaker, bulkhead, rate
/// limiter, hedging, executor. Each hook can be swapped independently and
/// defaults to its no-op implementation.
#[derive(Clone)]
pub struct ProtectionHooks {
    pub(crate) component: String,
    pub(crate) timeout: Arc<dyn TimeoutPolicy>,
    pub(crate) circuit_breaker: Arc<dyn CircuitBreaker>,
    pub(crate) bulkhead: Arc<dyn Bulkhead>,
    pub(crate) rate_limiter: Arc<dyn RateLimiter>,
    pub(crate) hedge: Arc<dyn HedgePolicy>,
}

impl Default for ProtectionHooks {
    fn default() -> Self {
        Self {
            component: "executor".to_string(),
            timeout: Arc::new(NoOpTimeoutPolicy),
            circuit_breaker: Arc::new(NoOpCircuitBreaker),
            bulkhead: Arc::new(NoOpBulkhead::default()),
            rate_limiter: Arc::new(NoOpRateLimiter),
            hedge: Arc::new(NoOpHedgePolicy),
        }
    }
}

impl fmt::Debug for ProtectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionHooks")
            .field("component", &self.component)
            .field("circuit_state", &self.circuit_breaker.state())
            .field("bulkhead", &self.bulkhead.config())
            .field("rate_limiter", &self.rate_limiter.config())
            .field("timeout", &self.timeout.per_attempt_timeout())
            .field("max_hedges", &self.hedge.max_hedges())
            .finish()
    }
}

impl ProtectionHooks {
    /// Build concrete hooks for every configured section, no-ops for the rest
    pub fn from_config(config: &ProtectionConfig) -> OrchestratorResult<Self> {
        config.validate()?;
        let mut hooks = Self {
            component: config.component_name.clone(),
            ..Self::default()
        };

        if let Some(timeout) = &config.timeout {
            hooks.timeout = Arc::new(FixedTimeoutPolicy::new(timeout));
        }
        if let Some(breaker) = &config.circuit_breaker {
            hooks.circuit_breaker = Arc::new(FailureThresholdCircuitBreaker::new(
                config.component_name.clone(),
                breaker.clone(),
            ));
        }
        if let Some(bulkhead) = &config.bulkhead {
            hooks.bulkhead = Arc::new(SemaphoreBulkhead::new(bulkhead.clone()));
        }
        if let Some(rate_limiter) = &config.rate_limiter {
            hooks.rate_limiter = Arc::new(TokenBucketRateLimiter::new(rate_limiter.clone()));
        }
        if let Some(hedge) = &config.hedge {
            hooks.hedge = Arc::new(FixedDelayHedgePolicy::new(hedge.clone()));
        }
        Ok(hooks)
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Arc<dyn TimeoutPolicy>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<dyn CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_bulkhead(mut self, bulkhead: Arc<dyn Bulkhead>) -> Self {
        self.bulkhead = bulkhead;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_hedge(mut self, hedge: Arc<dyn HedgePolicy>) -> Self {
        self.hedge = hedge;
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn circuit_breaker(&self) -> &Arc<dyn CircuitBreaker> {
        &self.circuit_breaker
    }

    pub fn bulkhead(&self) -> &Arc<dyn Bulkhead> {
        &self.bulkhead
    }

    pub fn rate_limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.rate_limiter
    }

    pub fn timeout(&self) -> &Arc<dyn TimeoutPolicy> {
        &self.timeout
    }

    pub fn hedge(&self) -> &Arc<dyn HedgePolicy> {
        &self.hedge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{BulkheadConfig, CircuitBreakerConfig, CircuitState};

    #[test]
    fn test_default_hooks_are_permissive() {
        let hooks = ProtectionHooks::default();
        assert!(hooks.circuit_breaker().try_acquire());
        assert!(hooks.bulkhead().try_acquire());
        assert!(hooks.rate_limiter().try_acquire());
        assert!(hooks.timeout().per_attempt_timeout().is_none());
        assert_eq!(hooks.hedge().max_hedges(), 0);
    }

    #[test]
    fn test_from_config_builds_configured_hooks() {
        let config = ProtectionConfig {
            component_name: "payments".to_string(),
            circuit_breaker: Some(CircuitBreakerConfig {
                failure_threshold: 1,
                open_timeout_ms: 60_000,
                success_threshold: 1,
            }),
            bulkhead: Some(BulkheadConfig {
                max_concurrent_calls: 1,
                max_wait_duration_ms: 0,
            }),
            ..ProtectionConfig::default()
        };
        let hooks = ProtectionHooks::from_config(&config).unwrap();
        assert_eq!(hooks.component(), "payments");

        hooks.circuit_breaker().record_failure();
        assert_eq!(hooks.circuit_breaker().state(), CircuitState::Open);

        assert!(hooks.bulkhead().try_acquire());
        assert!(!hooks.bulkhead().try_acquire());
        // Unconfigured sections stay permissive
        assert!(hooks.rate_limiter().try_acquire());
    }
}
