//! Store wrapper that fails selected calls on demand.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::{Envelope, OpId, Outcome};
use crate::state_machine::{OperationState, WriteAheadState};
use crate::store::Store;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Store call that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFault {
    WriteAhead,
    Finalize,
    ScanWriteAhead,
    GetWriteAheadOutcome,
    ScanInProgress,
    GetEnvelope,
    GetState,
}

impl StoreFault {
    fn operation(self) -> &'static str {
        match self {
            Self::WriteAhead => "write_ahead",
            Self::Finalize => "finalize",
            Self::ScanWriteAhead => "scan_write_ahead",
            Self::GetWriteAheadOutcome => "get_write_ahead_outcome",
            Self::ScanInProgress => "scan_in_progress",
            Self::GetEnvelope => "get_envelope",
            Self::GetState => "get_state",
        }
    }
}

/// Delegates to an inner [`Store`] unless a fault is armed for the call.
///
/// Faults are armed with a count and consumed one per matching call, which
/// is how tests simulate a crash between `write_ahead` and `finalize`.
pub struct FaultInjectingStore {
    inner: Arc<dyn Store>,
    armed: Mutex<HashMap<StoreFault, usize>>,
    finalize_calls: AtomicUsize,
}

impl std::fmt::Debug for FaultInjectingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjectingStore")
            .field("armed", &*self.armed.lock())
            .field("finalize_calls", &self.finalize_calls.load(Ordering::Relaxed))
            .finish()
    }
}

impl FaultInjectingStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            armed: Mutex::new(HashMap::new()),
            finalize_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `times` calls of `fault`
    pub fn fail_next(&self, fault: StoreFault, times: usize) {
        *self.armed.lock().entry(fault).or_insert(0) += times;
    }

    /// Disarm every fault
    pub fn heal(&self) {
        self.armed.lock().clear();
    }

    /// Finalize calls that reached this wrapper, failed ones included
    pub fn finalize_calls(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }

    fn check(&self, fault: StoreFault) -> OrchestratorResult<()> {
        let mut armed = self.armed.lock();
        match armed.get_mut(&fault) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(OrchestratorError::store(fault.operation(), "injected fault"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Store for FaultInjectingStore {
    async fn write_ahead(&self, op_id: &OpId, outcome: &Outcome) -> OrchestratorResult<()> {
        self.check(StoreFault::WriteAhead)?;
        self.inner.write_ahead(op_id, outcome).await
    }

    async fn finalize(&self, op_id: &OpId, state: OperationState) -> OrchestratorResult<()> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        self.check(StoreFault::Finalize)?;
        self.inner.finalize(op_id, state).await
    }

    async fn scan_write_ahead(
        &self,
        state: WriteAheadState,
        batch_size: usize,
    ) -> OrchestratorResult<Vec<OpId>> {
        self.check(StoreFault::ScanWriteAhead)?;
        self.inner.scan_write_ahead(state, batch_size).await
    }

    async fn get_write_ahead_outcome(&self, op_id: &OpId) -> OrchestratorResult<Outcome> {
        self.check(StoreFault::GetWriteAheadOutcome)?;
        self.inner.get_write_ahead_outcome(op_id).await
    }

    async fn scan_in_progress(
        &self,
        timeout_threshold: Duration,
        batch_size: usize,
    ) -> OrchestratorResult<Vec<OpId>> {
        self.check(StoreFault::ScanInProgress)?;
        self.inner.scan_in_progress(timeout_threshold, batch_size).await
    }

    async fn get_envelope(&self, op_id: &OpId) -> OrchestratorResult<Envelope> {
        self.check(StoreFault::GetEnvelope)?;
        self.inner.get_envelope(op_id).await
    }

    async fn get_state(&self, op_id: &OpId) -> OrchestratorResult<OperationState> {
        self.check(StoreFault::GetState)?;
        self.inner.get_state(op_id).await
    }
}
