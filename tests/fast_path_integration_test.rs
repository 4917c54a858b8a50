//! Inline fast path end to end, including hand-off to async handles.

mod common;

use common::command;
use orchestrator_core::executor::{Executor, ProtectedExecutor};
use orchestrator_core::idempotency::{IdempotencyManager, InMemoryIdempotencyManager};
use orchestrator_core::models::{IdempotencyKey, Outcome, Success};
use orchestrator_core::orchestration::{
    await_terminal_state, FastPathConfig, InlineFastPathRunner, OperationHandle, Orchestrator,
};
use orchestrator_core::resilience::{
    ProtectionConfig, ProtectionHooks, RateLimiterConfig, TimeoutConfig,
};
use orchestrator_core::state_machine::OperationState;
use orchestrator_core::test_helpers::{ScriptStep, ScriptedExecutor};
use orchestrator_core::OrchestratorError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_completion_inside_budget_is_returned_inline() {
    let executor = Arc::new(ScriptedExecutor::new(|env, _| {
        ScriptStep::complete_after(
            Duration::from_millis(30),
            Success::with_message(env.op_id.clone(), "reserved"),
        )
    }));
    let runner = InlineFastPathRunner::new(executor, FastPathConfig::default());

    let handle = runner.submit(command("idem-inline"), 100).await.unwrap();

    match handle.outcome() {
        Some(Outcome::Ok(success)) => assert_eq!(success.message(), Some("reserved")),
        other => panic!("expected inline success, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_async_handoff_keeps_executor_working() {
    let executor = Arc::new(ScriptedExecutor::new(|env, _| {
        ScriptStep::complete_after(Duration::from_millis(500), Outcome::ok(env.op_id.clone()))
    }));
    let config = FastPathConfig::new(10, 200, "https://api.example.com/v1/operations/").unwrap();
    let runner = InlineFastPathRunner::new(executor.clone(), config);

    let handle = runner.submit(command("idem-slow"), 100).await.unwrap();
    let op_id = handle.op_id().clone();
    assert_eq!(
        handle.status_url().map(str::to_string),
        Some(format!("https://api.example.com/v1/operations/{op_id}/status"))
    );

    // The caller stopped waiting but the operation still finishes
    let state = await_terminal_state(
        executor.as_ref(),
        &op_id,
        Duration::from_secs(1),
        Duration::from_millis(10),
    )
    .await
    .unwrap();
    assert_eq!(state, Some(OperationState::Completed));
    assert_eq!(executor.execute_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_polling_fallback_without_completion_signal() {
    let executor = Arc::new(
        ScriptedExecutor::new(|env, _| {
            ScriptStep::complete_after(Duration::from_millis(40), Outcome::ok(env.op_id.clone()))
        })
        .without_completion_signal(),
    );
    let runner = InlineFastPathRunner::new(executor, FastPathConfig::default());

    let handle = runner.submit(command("idem-poll"), 200).await.unwrap();
    assert!(handle.is_completed_fast());
}

#[tokio::test]
async fn test_concurrent_submissions_are_independent() {
    let executor = Arc::new(ScriptedExecutor::always_ok());
    let runner = Arc::new(InlineFastPathRunner::new(executor.clone(), FastPathConfig::default()));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let runner = runner.clone();
        tasks.push(tokio::spawn(async move {
            runner.submit(command(&format!("idem-{i}")), 500).await
        }));
    }

    let mut op_ids = HashSet::new();
    for task in tasks {
        let handle = task.await.unwrap().unwrap();
        assert!(handle.is_completed_fast());
        op_ids.insert(handle.op_id().clone());
    }
    assert_eq!(op_ids.len(), 16);
    assert_eq!(executor.execute_calls(), 16);
}

#[tokio::test(start_paused = true)]
async fn test_resubmission_after_handoff_reports_existing_operation() {
    let executor = Arc::new(ScriptedExecutor::new(|env, _| {
        ScriptStep::complete_after(Duration::from_millis(300), Outcome::ok(env.op_id.clone()))
    }));
    let idempotency = Arc::new(InMemoryIdempotencyManager::new());
    let runner = InlineFastPathRunner::new(executor.clone(), FastPathConfig::default())
        .with_idempotency(idempotency.clone());

    let first = runner.submit(command("idem-repeat"), 100).await.unwrap();
    assert!(!first.is_completed_fast());

    // Same command again once the work has had time to finish
    tokio::time::advance(Duration::from_millis(300)).await;
    let second = runner.submit(command("idem-repeat"), 100).await.unwrap();

    assert_eq!(first.op_id(), second.op_id());
    assert!(second.is_completed_fast());
    assert_eq!(executor.execute_calls(), 1);

    let key = IdempotencyKey::from(&command("idem-repeat"));
    assert_eq!(idempotency.find(&key).await.unwrap().as_ref(), Some(first.op_id()));
}

#[tokio::test(start_paused = true)]
async fn test_protection_rejection_surfaces_to_caller() {
    let executor = Arc::new(ScriptedExecutor::always_ok());
    let hooks = ProtectionHooks::from_config(&ProtectionConfig {
        timeout: Some(TimeoutConfig {
            per_attempt_timeout_ms: 25,
        }),
        ..ProtectionConfig::default()
    })
    .unwrap();
    let protected: Arc<dyn Executor> = Arc::new(ProtectedExecutor::new(executor.clone(), hooks));
    let runner = InlineFastPathRunner::new(protected, FastPathConfig::default());

    // Healthy dispatch goes straight through the hooks
    let handle = runner.submit(command("idem-protected"), 100).await.unwrap();
    assert!(handle.is_completed_fast());

    let rejecting = Arc::new(ScriptedExecutor::new(|_, _| ScriptStep::Reject));
    let runner = InlineFastPathRunner::new(
        Arc::new(ProtectedExecutor::unprotected(rejecting)),
        FastPathConfig::default(),
    );
    let err = runner.submit(command("idem-rejected"), 100).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Executor { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_command_is_dispatched_on_resubmission() {
    let executor = Arc::new(ScriptedExecutor::always_ok());
    let hooks = ProtectionHooks::from_config(&ProtectionConfig {
        rate_limiter: Some(RateLimiterConfig {
            permits_per_second: 1,
            max_burst_size: 1,
            max_wait_ms: 0,
        }),
        ..ProtectionConfig::default()
    })
    .unwrap();
    let idempotency = Arc::new(InMemoryIdempotencyManager::new());
    let runner = InlineFastPathRunner::new(
        Arc::new(ProtectedExecutor::new(executor.clone(), hooks)),
        FastPathConfig::default(),
    )
    .with_idempotency(idempotency.clone());

    runner.submit(command("idem-first"), 100).await.unwrap();
    let err = runner.submit(command("idem-throttled"), 100).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::RateLimited { .. }));
    let key = IdempotencyKey::from(&command("idem-throttled"));
    assert_eq!(idempotency.find(&key).await.unwrap(), None);

    tokio::time::advance(Duration::from_secs(1)).await;
    let handle = runner.submit(command("idem-throttled"), 100).await.unwrap();

    assert!(handle.is_completed_fast());
    assert_eq!(executor.execute_calls(), 2);
    assert_eq!(idempotency.find(&key).await.unwrap().as_ref(), Some(handle.op_id()));
}

#[tokio::test]
async fn test_handles_serialize_for_api_responses() {
    let runner = InlineFastPathRunner::new(
        Arc::new(ScriptedExecutor::always_ok()),
        FastPathConfig::default(),
    );
    let handle = runner.submit_with_default_budget(command("idem-json")).await.unwrap();

    let json = serde_json::to_value(&handle).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["op_id"], handle.op_id().as_str());
    assert_eq!(json["outcome"]["type"], "ok");

    let decoded: OperationHandle = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, handle);
}
