//! # Store SPI
//!
//! Durable operation state plus the write-ahead log (WAL) that makes
//! finalization crash-safe.
//!
//! ## Write-ahead protocol
//!
//! 1. `write_ahead(op_id, outcome)` records the outcome with WAL state `Pending`.
//! 2. `finalize(op_id, terminal_state)` atomically moves the operation to the
//!    terminal state and flips the WAL row to `Completed`.
//!
//! A crash between the two steps leaves a `Pending` row that the
//! [`Finalizer`](crate::orchestration::Finalizer) later replays.

use crate::error::OrchestratorResult;
use crate::models::{Envelope, OpId, Outcome};
use crate::state_machine::{OperationState, WriteAheadState};
use async_trait::async_trait;
use std::time::Duration;

pub mod in_memory;

pub use in_memory::InMemoryStore;

/// Durable state and write-ahead log backend
///
/// Implementations must make `finalize` atomic per operation: of several
/// concurrent callers for the same `OpId`, exactly one succeeds and every
/// other caller receives a state-conflict error.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Durably record an outcome with WAL state `Pending`
    ///
    /// Recording an outcome for an already finalized operation leaves the
    /// existing rows untouched.
    async fn write_ahead(&self, op_id: &OpId, outcome: &Outcome) -> OrchestratorResult<()>;

    /// Move an operation to a terminal state and complete its WAL row
    ///
    /// Fails when `state` is not terminal, when the transition is illegal,
    /// when the operation is already finalized, or when neither the
    /// operation nor a WAL row exists.
    async fn finalize(&self, op_id: &OpId, state: OperationState) -> OrchestratorResult<()>;

    /// Up to `batch_size` operations whose WAL row is in `state`, oldest first
    async fn scan_write_ahead(
        &self,
        state: WriteAheadState,
        batch_size: usize,
    ) -> OrchestratorResult<Vec<OpId>>;

    /// Outcome recorded by `write_ahead`
    async fn get_write_ahead_outcome(&self, op_id: &OpId) -> OrchestratorResult<Outcome>;

    /// Up to `batch_size` operations in progress for longer than
    /// `timeout_threshold`, oldest first
    async fn scan_in_progress(
        &self,
        timeout_threshold: Duration,
        batch_size: usize,
    ) -> OrchestratorResult<Vec<OpId>>;

    async fn get_envelope(&self, op_id: &OpId) -> OrchestratorResult<Envelope>;

    async fn get_state(&self, op_id: &OpId) -> OrchestratorResult<OperationState>;
}
