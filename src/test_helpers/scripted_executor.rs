//! Executor whose behavior is driven by a closure.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::executor::Executor;
use crate::models::{Envelope, OpId, Outcome};
use crate::state_machine::OperationState;
use crate::store::InMemoryStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// What the executor does with one dispatch
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Reach a terminal state with `outcome` after `after`
    Complete { after: Duration, outcome: Outcome },
    /// Accept the dispatch and stay in progress forever
    Hang,
    /// Refuse the dispatch with an executor error
    Reject,
}

impl ScriptStep {
    pub fn complete(outcome: impl Into<Outcome>) -> Self {
        Self::complete_after(Duration::ZERO, outcome)
    }

    pub fn complete_after(after: Duration, outcome: impl Into<Outcome>) -> Self {
        Self::Complete {
            after,
            outcome: outcome.into(),
        }
    }

    /// Immediate success for the envelope's operation
    pub fn ok(envelope: &Envelope) -> Self {
        Self::complete(Outcome::ok(envelope.op_id.clone()))
    }
}

type Script = dyn Fn(&Envelope, u32) -> ScriptStep + Send + Sync;

struct OperationSlot {
    attempts: u32,
    outcome: Option<Outcome>,
    state: watch::Sender<OperationState>,
}

impl OperationSlot {
    fn new() -> Self {
        let (state, _) = watch::channel(OperationState::Pending);
        Self {
            attempts: 0,
            outcome: None,
            state,
        }
    }
}

/// Terminal executor state reported for an outcome
fn terminal_state(outcome: &Outcome) -> OperationState {
    match outcome {
        Outcome::Ok(_) => OperationState::Completed,
        Outcome::Retry(_) | Outcome::Fail(_) => OperationState::Failed,
    }
}

fn settle(operations: &DashMap<OpId, OperationSlot>, op_id: &OpId, outcome: Outcome) {
    if let Some(mut slot) = operations.get_mut(op_id) {
        let state = terminal_state(&outcome);
        slot.outcome = Some(outcome);
        slot.state.send_replace(state);
    }
}

/// Scriptable [`Executor`] for tests.
///
/// The script receives each envelope with its 1-based attempt number for
/// that operation and decides how the dispatch plays out. Every dispatch
/// resets the operation to `InProgress`; when wired to an [`InMemoryStore`]
/// the store's operation is marked in progress too, the way a real executor
/// would record that it picked the work up.
pub struct ScriptedExecutor {
    script: Box<Script>,
    operations: Arc<DashMap<OpId, OperationSlot>>,
    store: Option<Arc<InMemoryStore>>,
    signals: bool,
    execute_calls: AtomicUsize,
}

impl fmt::Debug for ScriptedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedExecutor")
            .field("operations", &self.operations.len())
            .field("signals", &self.signals)
            .field("execute_calls", &self.execute_calls.load(Ordering::Relaxed))
            .finish()
    }
}

impl ScriptedExecutor {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Envelope, u32) -> ScriptStep + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            operations: Arc::new(DashMap::new()),
            store: None,
            signals: true,
            execute_calls: AtomicUsize::new(0),
        }
    }

    /// Every dispatch succeeds immediately
    pub fn always_ok() -> Self {
        Self::new(|envelope, _| ScriptStep::ok(envelope))
    }

    /// Mark operations in progress in `store` on every accepted dispatch
    #[must_use]
    pub fn with_store(mut self, store: Arc<InMemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Disable completion signals so waiters fall back to polling
    #[must_use]
    pub fn without_completion_signal(mut self) -> Self {
        self.signals = false;
        self
    }

    /// Total `execute` calls, rejected ones included
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// Dispatches seen for one operation
    pub fn attempts(&self, op_id: &OpId) -> u32 {
        self.operations
            .get(op_id)
            .map(|slot| slot.attempts)
            .unwrap_or(0)
    }

    /// Complete an operation from outside the script, e.g. after a `Hang`
    pub fn complete(&self, op_id: &OpId, outcome: impl Into<Outcome>) {
        settle(&self.operations, op_id, outcome.into());
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let op_id = &envelope.op_id;

        let attempt = {
            let mut slot = self
                .operations
                .entry(op_id.clone())
                .or_insert_with(OperationSlot::new);
            slot.attempts += 1;
            slot.attempts
        };

        let step = (self.script)(envelope, attempt);
        if matches!(step, ScriptStep::Reject) {
            return Err(OrchestratorError::executor(
                "execute",
                format!("dispatch rejected for operation {op_id}"),
            ));
        }

        if let Some(store) = &self.store {
            if let Err(err) = store.mark_in_progress(op_id) {
                debug!(op_id = %op_id, error = %err, "Store did not accept in-progress marker");
            }
        }

        if let Some(mut slot) = self.operations.get_mut(op_id) {
            slot.outcome = None;
            slot.state.send_replace(OperationState::InProgress);
        }

        match step {
            ScriptStep::Complete { after, outcome } if after.is_zero() => {
                settle(&self.operations, op_id, outcome);
            }
            ScriptStep::Complete { after, outcome } => {
                let operations = Arc::clone(&self.operations);
                let op_id = op_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    settle(&operations, &op_id, outcome);
                });
            }
            ScriptStep::Hang | ScriptStep::Reject => {}
        }
        Ok(())
    }

    async fn get_state(&self, op_id: &OpId) -> OrchestratorResult<OperationState> {
        self.operations
            .get(op_id)
            .map(|slot| *slot.state.borrow())
            .ok_or_else(|| OrchestratorError::not_found("operation", op_id))
    }

    async fn get_outcome(&self, op_id: &OpId) -> OrchestratorResult<Outcome> {
        self.operations
            .get(op_id)
            .and_then(|slot| slot.outcome.clone())
            .ok_or_else(|| OrchestratorError::not_found("outcome", op_id))
    }

    fn completion_signal(&self, op_id: &OpId) -> Option<watch::Receiver<OperationState>> {
        if !self.signals {
            return None;
        }
        self.operations.get(op_id).map(|slot| slot.state.subscribe())
    }
}
