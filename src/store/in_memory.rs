//! # In-Memory Store
//!
//! Thread-safe [`Store`] for tests, development and single-process hosts.
//!
//! ## Features
//!
//! - **Atomic Finalize**: All mutation happens under one `parking_lot::Mutex`,
//!   so concurrent finalizers of the same operation serialize and exactly one wins
//! - **Ordered WAL Scans**: WAL rows carry a creation sequence number
//! - **Test Helpers**: Envelope registration and in-progress marking

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::Store;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::{Envelope, OpId, Outcome};
use crate::state_machine::{OperationState, StateTransition, WriteAheadState};

#[derive(Debug, Clone)]
struct OperationRecord {
    state: OperationState,
    /// When the operation entered `InProgress`
    in_progress_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct WriteAheadEntry {
    outcome: Outcome,
    state: WriteAheadState,
    sequence: u64,
}

#[derive(Debug, Default)]
struct StoreInner {
    operations: HashMap<OpId, OperationRecord>,
    envelopes: HashMap<OpId, Envelope>,
    write_ahead_log: HashMap<OpId, WriteAheadEntry>,
    next_sequence: u64,
}

/// In-memory implementation of the [`Store`] SPI
///
/// # Example
///
/// ```rust
/// use orchestrator_core::models::{Command, Envelope, OpId, Outcome};
/// use orchestrator_core::state_machine::{OperationState, WriteAheadState};
/// use orchestrator_core::store::{InMemoryStore, Store};
///
/// # async fn example() -> orchestrator_core::OrchestratorResult<()> {
/// let store = InMemoryStore::new();
/// let op_id = OpId::new("op-1")?;
/// let command = Command::parse("ORDERS", "ORDER_PLACED", "order-1", "idem-1", "{}")?;
/// store.save_envelope(Envelope::now(op_id.clone(), command));
/// store.mark_in_progress(&op_id)?;
///
/// store.write_ahead(&op_id, &Outcome::ok(op_id.clone())).await?;
/// store.finalize(&op_id, OperationState::Completed).await?;
///
/// assert_eq!(store.get_state(&op_id).await?, OperationState::Completed);
/// assert_eq!(store.write_ahead_state(&op_id), Some(WriteAheadState::Completed));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted envelope. The operation starts `Pending` unless
    /// it is already known.
    pub fn save_envelope(&self, envelope: Envelope) {
        let mut inner = self.inner.lock();
        inner
            .operations
            .entry(envelope.op_id.clone())
            .or_insert(OperationRecord {
                state: OperationState::Pending,
                in_progress_since: None,
            });
        inner.envelopes.insert(envelope.op_id.clone(), envelope);
    }

    /// Move an operation to `InProgress` starting now
    pub fn mark_in_progress(&self, op_id: &OpId) -> OrchestratorResult<()> {
        self.mark_in_progress_at(op_id, Utc::now())
    }

    /// Move an operation to `InProgress` with an explicit start time.
    ///
    /// Re-asserting `InProgress` keeps the original start time. Unknown
    /// operations are treated as `Pending`.
    pub fn mark_in_progress_at(
        &self,
        op_id: &OpId,
        since: DateTime<Utc>,
    ) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock();
        let record = inner
            .operations
            .entry(op_id.clone())
            .or_insert(OperationRecord {
                state: OperationState::Pending,
                in_progress_since: None,
            });
        record.state = StateTransition::transition(record.state, OperationState::InProgress)?;
        if record.in_progress_since.is_none() {
            record.in_progress_since = Some(since);
        }
        Ok(())
    }

    /// WAL row state for an operation, if a row exists
    pub fn write_ahead_state(&self, op_id: &OpId) -> Option<WriteAheadState> {
        self.inner
            .lock()
            .write_ahead_log
            .get(op_id)
            .map(|entry| entry.state)
    }

    /// Number of known operations (for testing)
    pub fn operation_count(&self) -> usize {
        self.inner.lock().operations.len()
    }

    /// Remove everything (for testing)
    pub fn clear(&self) {
        *self.inner.lock() = StoreInner::default();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn write_ahead(&self, op_id: &OpId, outcome: &Outcome) -> OrchestratorResult<()> {
        let mut inner = self.inner.lock();

        if let Some(record) = inner.operations.get(op_id) {
            if record.state.is_terminal() {
                debug!(
                    op_id = %op_id,
                    state = %record.state,
                    "Ignoring write-ahead for finalized operation"
                );
                return Ok(());
            }
        }

        let sequence = match inner.write_ahead_log.get(op_id) {
            Some(existing) => existing.sequence,
            None => {
                inner.next_sequence += 1;
                inner.next_sequence
            }
        };
        inner.write_ahead_log.insert(
            op_id.clone(),
            WriteAheadEntry {
                outcome: outcome.clone(),
                state: WriteAheadState::Pending,
                sequence,
            },
        );

        debug!(op_id = %op_id, outcome = outcome.kind(), "📝 Write-ahead recorded");
        Ok(())
    }

    async fn finalize(&self, op_id: &OpId, state: OperationState) -> OrchestratorResult<()> {
        if !state.is_terminal() {
            return Err(OrchestratorError::validation(
                "state",
                format!("finalize requires a terminal state, got {state}"),
            ));
        }

        let mut inner = self.inner.lock();
        let has_wal_row = inner.write_ahead_log.contains_key(op_id);

        let current = match inner.operations.get(op_id) {
            Some(record) => record.state,
            // A WAL row implies the operation was dispatched
            None if has_wal_row => OperationState::InProgress,
            None => return Err(OrchestratorError::not_found("operation", op_id)),
        };

        if current.is_terminal() {
            return Err(OrchestratorError::AlreadyFinalized {
                op_id: op_id.clone(),
                state: current,
            });
        }
        let next = StateTransition::transition(current, state)?;

        let record = inner
            .operations
            .entry(op_id.clone())
            .or_insert(OperationRecord {
                state: current,
                in_progress_since: None,
            });
        record.state = next;

        if let Some(entry) = inner.write_ahead_log.get_mut(op_id) {
            entry.state = WriteAheadState::Completed;
        }

        info!(op_id = %op_id, state = %next, "✅ Operation finalized");
        Ok(())
    }

    async fn scan_write_ahead(
        &self,
        state: WriteAheadState,
        batch_size: usize,
    ) -> OrchestratorResult<Vec<OpId>> {
        let inner = self.inner.lock();
        let mut rows: Vec<(&OpId, u64)> = inner
            .write_ahead_log
            .iter()
            .filter(|(_, entry)| entry.state == state)
            .map(|(op_id, entry)| (op_id, entry.sequence))
            .collect();
        rows.sort_by_key(|(_, sequence)| *sequence);

        Ok(rows
            .into_iter()
            .take(batch_size)
            .map(|(op_id, _)| op_id.clone())
            .collect())
    }

    async fn get_write_ahead_outcome(&self, op_id: &OpId) -> OrchestratorResult<Outcome> {
        self.inner
            .lock()
            .write_ahead_log
            .get(op_id)
            .map(|entry| entry.outcome.clone())
            .ok_or_else(|| OrchestratorError::not_found("write-ahead outcome", op_id))
    }

    async fn scan_in_progress(
        &self,
        timeout_threshold: Duration,
        batch_size: usize,
    ) -> OrchestratorResult<Vec<OpId>> {
        let threshold = chrono::Duration::from_std(timeout_threshold)
            .map_err(|e| OrchestratorError::validation("timeout_threshold", e.to_string()))?;
        let cutoff = Utc::now() - threshold;

        let inner = self.inner.lock();
        let mut stuck: Vec<(&OpId, DateTime<Utc>)> = inner
            .operations
            .iter()
            .filter(|(_, record)| record.state == OperationState::InProgress)
            .filter_map(|(op_id, record)| {
                let since = record
                    .in_progress_since
                    .or_else(|| inner.envelopes.get(op_id).map(|e| e.accepted_at))?;
                (since < cutoff).then_some((op_id, since))
            })
            .collect();
        stuck.sort_by_key(|(_, since)| *since);

        Ok(stuck
            .into_iter()
            .take(batch_size)
            .map(|(op_id, _)| op_id.clone())
            .collect())
    }

    async fn get_envelope(&self, op_id: &OpId) -> OrchestratorResult<Envelope> {
        self.inner
            .lock()
            .envelopes
            .get(op_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::not_found("envelope", op_id))
    }

    async fn get_state(&self, op_id: &OpId) -> OrchestratorResult<OperationState> {
        self.inner
            .lock()
            .operations
            .get(op_id)
            .map(|record| record.state)
            .ok_or_else(|| OrchestratorError::not_found("operation", op_id))
    }
}
