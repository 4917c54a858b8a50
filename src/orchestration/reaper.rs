//! # Stuck Operation Reaper
//!
//! Background sweeper for operations that entered `InProgress` and never
//! came back, e.g. because the runner crashed mid-flight or the executor
//! lost the work. Operations in progress longer than `timeout_threshold_ms`
//! are reconciled with the configured [`ReconcileStrategy`]:
//!
//! - `Retry`: look up the original envelope and republish it unchanged
//! - `Fail`: finalize as failed without touching the bus
//!
//! Each operation is reconciled independently; results are aggregated into a
//! [`ReaperScanSummary`] and logged per sweep.

use super::config::{ReaperConfig, ReconcileStrategy};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::messaging::Bus;
use crate::metrics;
use crate::models::OpId;
use crate::state_machine::OperationState;
use crate::store::Store;
use opentelemetry::KeyValue;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info};

/// Results of one reaper sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReaperScanSummary {
    pub scanned: usize,
    pub republished: usize,
    pub failed: usize,
    /// Operations that reached a terminal state before the reaper got there
    pub already_finalized: usize,
    pub errors: usize,
}

impl ReaperScanSummary {
    pub fn reconciled(&self) -> usize {
        self.republished + self.failed
    }
}

/// Periodic sweeper for stuck in-progress operations
pub struct Reaper {
    store: Arc<dyn Store>,
    bus: Arc<dyn Bus>,
    config: ReaperConfig,
}

impl fmt::Debug for Reaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaper").field("config", &self.config).finish()
    }
}

impl Reaper {
    pub fn new(store: Arc<dyn Store>, bus: Arc<dyn Bus>, config: ReaperConfig) -> Self {
        Self { store, bus, config }
    }

    #[must_use]
    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// Reconcile up to `batch_size` stuck operations, oldest first
    pub async fn scan(&self) -> OrchestratorResult<ReaperScanSummary> {
        let strategy = self.config.default_strategy();
        let stuck = self
            .store
            .scan_in_progress(self.config.timeout_threshold(), self.config.batch_size())
            .await?;

        let mut summary = ReaperScanSummary {
            scanned: stuck.len(),
            ..Default::default()
        };

        for op_id in &stuck {
            match self.reconcile(op_id, strategy).await {
                Ok(ReconcileStrategy::Retry) => summary.republished += 1,
                Ok(ReconcileStrategy::Fail) => summary.failed += 1,
                Err(OrchestratorError::AlreadyFinalized { .. }) => summary.already_finalized += 1,
                Err(err) => {
                    error!(
                        op_id = %op_id,
                        strategy = %strategy,
                        error = %err,
                        "❌ REAPER: Reconciliation failed"
                    );
                    summary.errors += 1;
                }
            }
        }

        if summary.scanned > 0 {
            info!(
                strategy = %strategy,
                scanned = summary.scanned,
                republished = summary.republished,
                failed = summary.failed,
                already_finalized = summary.already_finalized,
                errors = summary.errors,
                "💀 REAPER: Sweep finished"
            );
        } else {
            debug!("REAPER: No stuck operations");
        }
        Ok(summary)
    }

    async fn reconcile(
        &self,
        op_id: &OpId,
        strategy: ReconcileStrategy,
    ) -> OrchestratorResult<ReconcileStrategy> {
        match strategy {
            ReconcileStrategy::Retry => {
                let envelope = self.store.get_envelope(op_id).await?;
                self.bus.publish(&envelope, Duration::ZERO).await?;
                debug!(op_id = %op_id, "🔄 REAPER: Envelope republished");
            }
            ReconcileStrategy::Fail => {
                self.store.finalize(op_id, OperationState::Failed).await?;
                metrics::operations_failed_total().add(1, &[KeyValue::new("reason", "reaped")]);
                debug!(op_id = %op_id, "REAPER: Operation failed");
            }
        }
        metrics::reaper_reconciled_total()
            .add(1, &[KeyValue::new("strategy", strategy.to_string())]);
        Ok(strategy)
    }

    /// Sweep every `scan_interval_ms` until `shutdown` fires
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.scan_interval());
        info!(
            scan_interval_ms = self.config.scan_interval_ms(),
            timeout_threshold_ms = self.config.timeout_threshold_ms(),
            strategy = %self.config.default_strategy(),
            "🚀 REAPER: Starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("REAPER: Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.scan().await {
                        error!(error = %err, "REAPER: Sweep failed");
                    }
                }
            }
        }
    }
}
