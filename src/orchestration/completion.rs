//! Waiting for an executor to bring an operation to a terminal state.

use crate::error::OrchestratorResult;
use crate::executor::Executor;
use crate::models::OpId;
use crate::state_machine::OperationState;
use std::time::Duration;
use tokio::time::Instant;

/// Wait until the executor reports a terminal state or `budget` elapses.
///
/// The state is checked immediately, then again whenever the executor's
/// completion signal changes or `poll_interval` passes, whichever comes
/// first. Returns `None` when the budget runs out. The executor's work is
/// never cancelled.
pub async fn await_terminal_state(
    executor: &dyn Executor,
    op_id: &OpId,
    budget: Duration,
    poll_interval: Duration,
) -> OrchestratorResult<Option<OperationState>> {
    let deadline = Instant::now() + budget;
    let mut signal = executor.completion_signal(op_id);

    loop {
        let state = executor.get_state(op_id).await?;
        if state.is_terminal() {
            return Ok(Some(state));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        let wait = poll_interval.min(deadline - now);

        match signal.as_mut() {
            Some(receiver) => {
                tokio::select! {
                    changed = receiver.changed() => {
                        if changed.is_err() {
                            // Sender dropped; fall back to polling
                            signal = None;
                        }
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            None => tokio::time::sleep(wait).await,
        }
    }
}
