//! # Executor SPI
//!
//! The seam between the orchestrator and the business logic that actually
//! performs an operation. Dispatch is asynchronous: `execute` returns once the
//! work is accepted, and runners observe progress through `get_state`.

use crate::error::OrchestratorResult;
use crate::models::{Envelope, OpId, Outcome};
use crate::state_machine::OperationState;
use async_trait::async_trait;
use tokio::sync::watch;

pub mod protected;

pub use protected::ProtectedExecutor;

/// Work dispatch backend
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Dispatch an envelope. Returns once the work is accepted, not when it
    /// finishes.
    async fn execute(&self, envelope: &Envelope) -> OrchestratorResult<()>;

    /// Current state of a dispatched operation
    async fn get_state(&self, op_id: &OpId) -> OrchestratorResult<OperationState>;

    /// Outcome of an operation in a terminal state
    async fn get_outcome(&self, op_id: &OpId) -> OrchestratorResult<Outcome>;

    /// Optional push notification of state changes.
    ///
    /// When provided, runners wake on every change instead of waiting for the
    /// next poll. Executors without one are polled at a fixed interval.
    fn completion_signal(&self, _op_id: &OpId) -> Option<watch::Receiver<OperationState>> {
        None
    }
}
