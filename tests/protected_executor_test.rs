//! Protection hooks wrapped around a real dispatch path.

mod common;

use async_trait::async_trait;
use orchestrator_core::error::{OrchestratorError, OrchestratorResult};
use orchestrator_core::executor::{Executor, ProtectedExecutor};
use orchestrator_core::models::{Envelope, OpId, Outcome};
use orchestrator_core::resilience::{
    Bulkhead, BulkheadConfig, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    FailureThresholdCircuitBreaker, FixedDelayHedgePolicy, HedgeConfig, ProtectionConfig,
    ProtectionHooks, RateLimiterConfig, SemaphoreBulkhead, TimeoutConfig,
};
use orchestrator_core::state_machine::OperationState;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How one dispatch behaves: how long it takes and whether it is accepted
#[derive(Debug, Clone, Copy)]
struct Dispatch {
    latency: Duration,
    accept: bool,
}

impl Dispatch {
    fn accept_after(ms: u64) -> Self {
        Self {
            latency: Duration::from_millis(ms),
            accept: true,
        }
    }

    fn reject() -> Self {
        Self {
            latency: Duration::ZERO,
            accept: false,
        }
    }
}

/// Executor whose dispatches follow a queue of scripted behaviors; once the
/// queue runs dry every dispatch uses `fallback`
struct DispatchScript {
    queue: Mutex<VecDeque<Dispatch>>,
    fallback: Dispatch,
    calls: AtomicUsize,
}

impl DispatchScript {
    fn new(fallback: Dispatch) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    fn then(self, dispatch: Dispatch) -> Self {
        self.queue.lock().push_back(dispatch);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for DispatchScript {
    async fn execute(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dispatch = self.queue.lock().pop_front().unwrap_or(self.fallback);
        tokio::time::sleep(dispatch.latency).await;
        if dispatch.accept {
            Ok(())
        } else {
            Err(OrchestratorError::executor(
                "execute",
                format!("downstream refused {}", envelope.op_id),
            ))
        }
    }

    async fn get_state(&self, _op_id: &OpId) -> OrchestratorResult<OperationState> {
        Ok(OperationState::InProgress)
    }

    async fn get_outcome(&self, op_id: &OpId) -> OrchestratorResult<Outcome> {
        Ok(Outcome::ok(op_id.clone()))
    }
}

fn breaker(failure_threshold: u32, open_timeout_ms: u64) -> Arc<FailureThresholdCircuitBreaker> {
    Arc::new(FailureThresholdCircuitBreaker::new(
        "payments",
        CircuitBreakerConfig {
            failure_threshold,
            open_timeout_ms,
            success_threshold: 1,
        },
    ))
}

#[tokio::test(start_paused = true)]
async fn test_slow_dispatch_times_out() {
    let inner = Arc::new(DispatchScript::new(Dispatch::accept_after(1_000)));
    let hooks = ProtectionHooks::from_config(&ProtectionConfig {
        timeout: Some(TimeoutConfig {
            per_attempt_timeout_ms: 50,
        }),
        ..ProtectionConfig::default()
    })
    .unwrap();
    let executor = ProtectedExecutor::new(inner, hooks);

    let err = executor.execute(&common::envelope("op-slow")).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::AttemptTimeout { timeout_ms: 50 }));
}

#[tokio::test]
async fn test_breaker_opens_after_consecutive_failures() {
    let inner = Arc::new(DispatchScript::new(Dispatch::reject()));
    let circuit = breaker(2, 60_000);
    let executor = ProtectedExecutor::new(
        inner.clone(),
        ProtectionHooks::default()
            .with_component("payments")
            .with_circuit_breaker(circuit.clone()),
    );
    let env = common::envelope("op-breaker");

    for _ in 0..2 {
        let err = executor.execute(&env).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Executor { .. }));
    }
    assert_eq!(circuit.state(), CircuitState::Open);

    let err = executor.execute(&env).await.unwrap_err();
    match err {
        OrchestratorError::CircuitOpen { component } => assert_eq!(component, "payments"),
        other => panic!("expected circuit open, got {other:?}"),
    }
    // Fail fast: the downstream was not called a third time
    assert_eq!(inner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_recovers_after_open_timeout() {
    let inner = Arc::new(
        DispatchScript::new(Dispatch::accept_after(0)).then(Dispatch::reject()),
    );
    let circuit = breaker(1, 500);
    let executor = ProtectedExecutor::new(
        inner.clone(),
        ProtectionHooks::default().with_circuit_breaker(circuit.clone()),
    );
    let env = common::envelope("op-recover");

    assert!(executor.execute(&env).await.is_err());
    assert_eq!(circuit.state(), CircuitState::Open);
    assert!(matches!(
        executor.execute(&env).await,
        Err(OrchestratorError::CircuitOpen { .. })
    ));

    tokio::time::advance(Duration::from_millis(500)).await;

    // Half-open probe succeeds and closes the circuit
    executor.execute(&env).await.unwrap();
    assert_eq!(circuit.state(), CircuitState::Closed);
    assert_eq!(inner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_breaker_failure() {
    let inner = Arc::new(DispatchScript::new(Dispatch::accept_after(1_000)));
    let circuit = breaker(1, 60_000);
    let hooks = ProtectionHooks::from_config(&ProtectionConfig {
        timeout: Some(TimeoutConfig {
            per_attempt_timeout_ms: 20,
        }),
        ..ProtectionConfig::default()
    })
    .unwrap()
    .with_circuit_breaker(circuit.clone());
    let executor = ProtectedExecutor::new(inner, hooks);
    let env = common::envelope("op-timeout-breaker");

    assert!(matches!(
        executor.execute(&env).await,
        Err(OrchestratorError::AttemptTimeout { .. })
    ));
    assert_eq!(circuit.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_probe_survives_bulkhead_rejection() {
    let inner = Arc::new(
        DispatchScript::new(Dispatch::accept_after(0)).then(Dispatch::reject()),
    );
    let circuit = breaker(1, 50);
    let bulkhead = Arc::new(SemaphoreBulkhead::new(BulkheadConfig {
        max_concurrent_calls: 1,
        max_wait_duration_ms: 0,
    }));
    let executor = ProtectedExecutor::new(
        inner.clone(),
        ProtectionHooks::default()
            .with_circuit_breaker(circuit.clone())
            .with_bulkhead(bulkhead.clone()),
    );
    let env = common::envelope("op-probe");

    assert!(executor.execute(&env).await.is_err());
    assert_eq!(circuit.state(), CircuitState::Open);
    tokio::time::advance(Duration::from_millis(60)).await;

    // Occupy the only bulkhead permit so the half-open probe is turned away locally
    assert!(bulkhead.try_acquire());
    assert!(matches!(
        executor.execute(&env).await,
        Err(OrchestratorError::BulkheadFull { .. })
    ));
    assert_eq!(circuit.state(), CircuitState::HalfOpen);
    assert_eq!(circuit.metrics().half_open_calls, 0);
    bulkhead.release();

    // The probe slot was handed back, so the next call reaches the executor and closes the circuit
    executor.execute(&env).await.unwrap();
    assert_eq!(circuit.state(), CircuitState::Closed);
    assert_eq!(inner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_full_bulkhead_rejects_without_dispatch() {
    let inner = Arc::new(DispatchScript::new(Dispatch::accept_after(200)));
    let hooks = ProtectionHooks::from_config(&ProtectionConfig {
        bulkhead: Some(BulkheadConfig {
            max_concurrent_calls: 1,
            max_wait_duration_ms: 0,
        }),
        ..ProtectionConfig::default()
    })
    .unwrap();
    let executor = Arc::new(ProtectedExecutor::new(inner.clone(), hooks));

    let holder = tokio::spawn({
        let executor = executor.clone();
        async move { executor.execute(&common::envelope("op-holder")).await }
    });
    // Let the first dispatch take the only permit
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    let err = executor.execute(&common::envelope("op-rejected")).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::BulkheadFull {
            max_concurrent_calls: 1
        }
    ));

    holder.await.unwrap().unwrap();
    assert_eq!(inner.calls(), 1);

    // The permit is back once the first dispatch finished
    executor.execute(&common::envelope("op-after")).await.unwrap();
    assert_eq!(inner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limiter_rejects_over_budget() {
    let inner = Arc::new(DispatchScript::new(Dispatch::accept_after(0)));
    let hooks = ProtectionHooks::from_config(&ProtectionConfig {
        rate_limiter: Some(RateLimiterConfig {
            permits_per_second: 1,
            max_burst_size: 1,
            max_wait_ms: 0,
        }),
        ..ProtectionConfig::default()
    })
    .unwrap();
    let executor = ProtectedExecutor::new(inner.clone(), hooks);
    let env = common::envelope("op-limited");

    executor.execute(&env).await.unwrap();
    let err = executor.execute(&env).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::RateLimited {
            permits_per_second: 1
        }
    ));
    assert_eq!(inner.calls(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    executor.execute(&env).await.unwrap();
    assert_eq!(inner.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hedge_wins_over_slow_primary() {
    let inner = Arc::new(
        DispatchScript::new(Dispatch::accept_after(5)).then(Dispatch::accept_after(1_000)),
    );
    let hedge = Arc::new(FixedDelayHedgePolicy::new(HedgeConfig {
        hedge_delay_ms: 20,
        max_hedges: 1,
    }));
    let executor = ProtectedExecutor::new(
        inner.clone(),
        ProtectionHooks::default().with_hedge(hedge.clone()),
    );

    let started = tokio::time::Instant::now();
    executor.execute(&common::envelope("op-hedged")).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(inner.calls(), 2);
    assert_eq!(hedge.hedge_attempts(), 1);
    assert_eq!(hedge.hedge_wins(), 1);
    assert_eq!(hedge.primary_wins(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fast_primary_needs_no_hedge() {
    let inner = Arc::new(DispatchScript::new(Dispatch::accept_after(5)));
    let hedge = Arc::new(FixedDelayHedgePolicy::new(HedgeConfig {
        hedge_delay_ms: 50,
        max_hedges: 2,
    }));
    let executor = ProtectedExecutor::new(
        inner.clone(),
        ProtectionHooks::default().with_hedge(hedge.clone()),
    );

    executor.execute(&common::envelope("op-quick")).await.unwrap();

    assert_eq!(inner.calls(), 1);
    assert_eq!(hedge.hedge_attempts(), 0);
    assert_eq!(hedge.primary_wins(), 1);
}

#[tokio::test]
async fn test_default_config_passes_everything_through() {
    let inner = Arc::new(DispatchScript::new(Dispatch::accept_after(0)));
    let hooks = ProtectionHooks::from_config(&ProtectionConfig::default()).unwrap();
    let executor = ProtectedExecutor::new(inner.clone(), hooks);

    for i in 0..20 {
        executor.execute(&common::envelope(&format!("op-{i}"))).await.unwrap();
    }
    assert_eq!(inner.calls(), 20);
    assert_eq!(executor.hooks().circuit_breaker().state(), CircuitState::Closed);

    let op_id = OpId::new("op-0").unwrap();
    assert_eq!(executor.get_state(&op_id).await.unwrap(), OperationState::InProgress);
    assert!(executor.get_outcome(&op_id).await.unwrap().is_ok());
}

#[test]
fn test_invalid_protection_config_is_rejected() {
    let config = ProtectionConfig {
        bulkhead: Some(BulkheadConfig {
            max_concurrent_calls: 0,
            max_wait_duration_ms: 0,
        }),
        ..ProtectionConfig::default()
    };
    assert!(matches!(
        ProtectionHooks::from_config(&config),
        Err(OrchestratorError::Validation { .. })
    ));
}
