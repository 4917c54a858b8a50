//! # Inline Fast Path
//!
//! Synchronous-looking submission for callers that can wait a little. The
//! runner dispatches the command and waits on the caller's task for up to
//! the time budget:
//!
//! - terminal state in time: [`OperationHandle::Completed`] with the outcome
//! - budget elapsed: [`OperationHandle::Async`] with a status URL, while the
//!   executor keeps working in the background
//!
//! The runner holds no per-request state and is safe for concurrent use.

use super::completion::await_terminal_state;
use super::config::FastPathConfig;
use super::operation_handle::OperationHandle;
use crate::error::OrchestratorResult;
use crate::executor::Executor;
use crate::idempotency::IdempotencyManager;
use crate::metrics;
use crate::models::{Command, Envelope, IdempotencyKey, OpId};
use async_trait::async_trait;
use opentelemetry::KeyValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Entry point for accepting commands
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Accept a command and wait up to `time_budget_ms` for it to finish.
    ///
    /// The budget must lie in `[50, 5000]` milliseconds.
    async fn submit(
        &self,
        command: Command,
        time_budget_ms: u64,
    ) -> OrchestratorResult<OperationHandle>;
}

/// [`Orchestrator`] that executes inline and falls back to async handles
pub struct InlineFastPathRunner {
    executor: Arc<dyn Executor>,
    config: FastPathConfig,
    idempotency: Option<Arc<dyn IdempotencyManager>>,
}

impl fmt::Debug for InlineFastPathRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineFastPathRunner")
            .field("config", &self.config)
            .field("idempotency", &self.idempotency.is_some())
            .finish()
    }
}

impl InlineFastPathRunner {
    pub fn new(executor: Arc<dyn Executor>, config: FastPathConfig) -> Self {
        Self {
            executor,
            config,
            idempotency: None,
        }
    }

    /// Resolve OpIds through an idempotency manager, so a repeated command
    /// maps onto the operation already accepted for it
    #[must_use]
    pub fn with_idempotency(mut self, manager: Arc<dyn IdempotencyManager>) -> Self {
        self.idempotency = Some(manager);
        self
    }

    pub fn config(&self) -> &FastPathConfig {
        &self.config
    }

    /// Submit with the configured default time budget
    pub async fn submit_with_default_budget(
        &self,
        command: Command,
    ) -> OrchestratorResult<OperationHandle> {
        self.submit(command, self.config.default_time_budget_ms()).await
    }

    async fn resolve_op_id(&self, command: &Command) -> OrchestratorResult<(OpId, bool)> {
        let Some(manager) = &self.idempotency else {
            return Ok((OpId::generate(), false));
        };

        let key = IdempotencyKey::from(command);
        if let Some(existing) = manager.find(&key).await? {
            return Ok((existing, true));
        }
        Ok((manager.get_or_create(&key).await?, false))
    }

    /// Unbind the command's key when its operation was never dispatched
    async fn release_binding(&self, envelope: &Envelope) {
        let Some(manager) = &self.idempotency else {
            return;
        };
        let op_id = &envelope.op_id;
        let key = IdempotencyKey::from(&envelope.command);
        match manager.release(&key, op_id).await {
            Ok(released) => {
                debug!(
                    op_id = %op_id,
                    released,
                    "FAST PATH: Dispatch rejected, idempotency key unbound"
                );
            }
            Err(e) => {
                warn!(op_id = %op_id, error = %e, "FAST PATH: Failed to release idempotency key");
            }
        }
    }

    async fn wait_for_handle(
        &self,
        op_id: OpId,
        time_budget_ms: u64,
    ) -> OrchestratorResult<OperationHandle> {
        let state = await_terminal_state(
            self.executor.as_ref(),
            &op_id,
            Duration::from_millis(time_budget_ms),
            self.config.poll_interval(),
        )
        .await?;

        match state {
            Some(state) => {
                let outcome = self.executor.get_outcome(&op_id).await?;
                debug!(op_id = %op_id, state = %state, "⚡ FAST PATH: Completed within budget");
                metrics::fast_path_submissions_total()
                    .add(1, &[KeyValue::new("result", "completed")]);
                Ok(OperationHandle::completed(op_id, outcome))
            }
            None => {
                info!(
                    op_id = %op_id,
                    time_budget_ms = time_budget_ms,
                    "FAST PATH: Budget elapsed, handing off asynchronously"
                );
                metrics::fast_path_submissions_total().add(1, &[KeyValue::new("result", "async")]);
                Ok(OperationHandle::pending(op_id, self.config.status_url_base()))
            }
        }
    }
}

#[async_trait]
impl Orchestrator for InlineFastPathRunner {
    async fn submit(
        &self,
        command: Command,
        time_budget_ms: u64,
    ) -> OrchestratorResult<OperationHandle> {
        FastPathConfig::validate_time_budget(time_budget_ms)?;

        let (op_id, duplicate) = self.resolve_op_id(&command).await?;
        if duplicate {
            // Already accepted; report on the existing operation without redispatching
            debug!(op_id = %op_id, "FAST PATH: Duplicate command, reusing operation");
            return self.wait_for_handle(op_id, time_budget_ms).await;
        }

        let envelope = Envelope::now(op_id.clone(), command);
        if let Err(e) = self.executor.execute(&envelope).await {
            self.release_binding(&envelope).await;
            return Err(e);
        }
        debug!(op_id = %op_id, "FAST PATH: Dispatched");

        self.wait_for_handle(op_id, time_budget_ms).await
    }
}
