//! # Write-Ahead Finalizer
//!
//! Background sweeper that closes the gap between `write_ahead` and
//! `finalize`. A runner that crashes (or whose finalize fails) after
//! recording an outcome leaves a `Pending` WAL row behind; the finalizer maps
//! the recorded outcome to a terminal state and finalizes it.
//!
//! ## Recovery Mapping
//!
//! | Recorded outcome | Terminal state |
//! |------------------|----------------|
//! | `Ok`             | `Completed`    |
//! | `Fail`           | `Failed`       |
//! | `Retry`          | `Failed` (logged as a warning) |
//!
//! Items are isolated: a failure is logged and retried on the next scan.
//! Relying only on `finalize` atomicity, any number of finalizer instances can
//! sweep the same store concurrently.

use super::config::FinalizerConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::metrics;
use crate::models::{OpId, Outcome};
use crate::state_machine::{OperationState, WriteAheadState};
use crate::store::Store;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Results of one finalizer scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinalizerScanSummary {
    pub scanned: usize,
    pub completed: usize,
    pub failed: usize,
    /// Rows whose operation another finalizer got to first
    pub already_finalized: usize,
    pub errors: usize,
}

impl FinalizerScanSummary {
    pub fn recovered(&self) -> usize {
        self.completed + self.failed
    }
}

/// Maps a recorded outcome to the terminal state the finalizer applies
pub fn recovery_state(outcome: &Outcome) -> OperationState {
    match outcome {
        Outcome::Ok(_) => OperationState::Completed,
        Outcome::Fail(_) | Outcome::Retry(_) => OperationState::Failed,
    }
}

/// Periodic WAL recovery sweeper
pub struct Finalizer {
    store: Arc<dyn Store>,
    config: FinalizerConfig,
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer")
            .field("config", &self.config)
            .finish()
    }
}

impl Finalizer {
    pub fn new(store: Arc<dyn Store>, config: FinalizerConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &FinalizerConfig {
        &self.config
    }

    /// Finalize up to `batch_size` pending WAL rows, oldest first
    pub async fn scan(&self) -> OrchestratorResult<FinalizerScanSummary> {
        let pending = self
            .store
            .scan_write_ahead(WriteAheadState::Pending, self.config.batch_size())
            .await?;

        let mut summary = FinalizerScanSummary {
            scanned: pending.len(),
            ..Default::default()
        };

        for op_id in &pending {
            match self.recover(op_id).await {
                Ok(OperationState::Completed) => summary.completed += 1,
                Ok(_) => summary.failed += 1,
                Err(OrchestratorError::AlreadyFinalized { state, .. }) => {
                    debug!(
                        op_id = %op_id,
                        state = %state,
                        "Operation already finalized by another instance"
                    );
                    summary.already_finalized += 1;
                }
                Err(err) => {
                    error!(
                        op_id = %op_id,
                        error = %err,
                        "❌ FINALIZER: Recovery failed, will retry next scan"
                    );
                    summary.errors += 1;
                }
            }
        }

        if summary.scanned > 0 {
            info!(
                scanned = summary.scanned,
                completed = summary.completed,
                failed = summary.failed,
                already_finalized = summary.already_finalized,
                errors = summary.errors,
                "🧹 FINALIZER: Scan finished"
            );
        }
        Ok(summary)
    }

    async fn recover(&self, op_id: &OpId) -> OrchestratorResult<OperationState> {
        let outcome = self.store.get_write_ahead_outcome(op_id).await?;
        if let Outcome::Retry(retry) = &outcome {
            warn!(
                op_id = %op_id,
                attempt = retry.attempt_count(),
                "FINALIZER: Recorded outcome is a retry, finalizing as failed"
            );
        }

        let target = recovery_state(&outcome);
        self.store.finalize(op_id, target).await?;
        metrics::finalizer_recovered_total().add(1, &[]);
        debug!(op_id = %op_id, state = %target, "✅ FINALIZER: Operation finalized");
        Ok(target)
    }

    /// Scan every `scan_interval_ms` until `shutdown` fires.
    ///
    /// Scan errors are logged and never stop the loop.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.scan_interval());
        info!(
            scan_interval_ms = self.config.scan_interval_ms(),
            batch_size = self.config.batch_size(),
            "🚀 FINALIZER: Starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("FINALIZER: Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.scan().await {
                        error!(error = %err, "FINALIZER: Scan failed");
                    }
                }
            }
        }
    }
}
