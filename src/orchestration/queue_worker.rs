//! # Queue Worker Runner
//!
//! Queue path of the orchestrator. Each pump dequeues a batch from the
//! [`Bus`], hands every envelope to a bounded worker pool and settles it:
//!
//! 1. `execute` the envelope and wait for a terminal executor state, bounded
//!    by `max_processing_time_ms`
//! 2. Fetch the [`Outcome`] and apply it:
//!    - `Ok`: write-ahead, then finalize as completed (a failed finalize is
//!      left for the [`Finalizer`](super::Finalizer); an operation that is
//!      already terminal is reported as a duplicate)
//!    - `Retry`: republish with backoff while attempts remain, otherwise
//!      finalize as failed
//!    - `Fail`: finalize as failed and dead-letter when enabled
//! 3. `ack` the envelope, or `nack` it on any error
//!
//! Envelopes are isolated from each other: one failure never aborts the batch.

use super::backoff_calculator::BackoffCalculator;
use super::completion::await_terminal_state;
use super::config::QueueWorkerConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::executor::Executor;
use crate::messaging::Bus;
use crate::metrics;
use crate::models::{Envelope, OpId, Outcome};
use crate::state_machine::OperationState;
use crate::store::Store;
use async_trait::async_trait;
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Interval between executor state checks while an envelope is processing
pub const DEFAULT_STATE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Host-scheduled queue processing
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Run one dequeue-and-process cycle
    async fn pump(&self) -> OrchestratorResult<PumpSummary>;
}

/// How an envelope was settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Completed,
    RetryScheduled { attempt: u32, delay: Duration },
    RetriesExhausted { attempt: u32 },
    Failed { dead_lettered: bool },
    /// A duplicate delivery of an operation that is already terminal
    AlreadyFinalized,
}

/// Result of one worker task
#[derive(Debug)]
pub struct EnvelopeReport {
    pub op_id: OpId,
    pub result: OrchestratorResult<Disposition>,
}

/// Aggregated results of a pump or drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PumpSummary {
    pub dequeued: usize,
    pub completed: usize,
    pub retries_scheduled: usize,
    pub failed: usize,
    pub dead_lettered: usize,
    pub duplicates: usize,
    pub errors: usize,
}

impl PumpSummary {
    fn record(&mut self, result: &OrchestratorResult<Disposition>) {
        match result {
            Ok(Disposition::Completed) => self.completed += 1,
            Ok(Disposition::RetryScheduled { .. }) => self.retries_scheduled += 1,
            Ok(Disposition::RetriesExhausted { .. }) => self.failed += 1,
            Ok(Disposition::Failed { dead_lettered }) => {
                self.failed += 1;
                if *dead_lettered {
                    self.dead_lettered += 1;
                }
            }
            Ok(Disposition::AlreadyFinalized) => self.duplicates += 1,
            Err(_) => self.errors += 1,
        }
    }

    /// Envelopes settled without error
    pub fn settled(&self) -> usize {
        self.completed + self.retries_scheduled + self.failed + self.duplicates
    }
}

/// Everything a worker task needs, shared across the pool
struct WorkerContext {
    bus: Arc<dyn Bus>,
    store: Arc<dyn Store>,
    executor: Arc<dyn Executor>,
    backoff: BackoffCalculator,
    config: QueueWorkerConfig,
    state_poll_interval: Duration,
}

impl WorkerContext {
    async fn process(&self, envelope: Envelope) -> OrchestratorResult<Disposition> {
        let started = Instant::now();
        let op_id = envelope.op_id.clone();

        let result = match self.settle(&envelope).await {
            Ok(disposition) => self.bus.ack(&envelope).await.map(|()| disposition),
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            error!(
                op_id = %op_id,
                error = %err,
                "❌ QUEUE WORKER: Envelope processing failed, nacking"
            );
            metrics::processing_errors_total().add(1, &[]);
            if let Err(nack_err) = self.bus.nack(&envelope).await {
                error!(op_id = %op_id, error = %nack_err, "Failed to nack envelope");
            }
        }

        metrics::processing_duration().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("success", result.is_ok())],
        );
        result
    }

    async fn settle(&self, envelope: &Envelope) -> OrchestratorResult<Disposition> {
        let op_id = &envelope.op_id;

        self.executor.execute(envelope).await?;

        let budget = self.config.max_processing_time();
        let state = await_terminal_state(
            self.executor.as_ref(),
            op_id,
            budget,
            self.state_poll_interval,
        )
        .await?;
        if state.is_none() {
            return Err(OrchestratorError::ProcessingTimeout {
                op_id: op_id.clone(),
                timeout_ms: self.config.max_processing_time_ms(),
            });
        }

        match self.executor.get_outcome(op_id).await? {
            outcome @ Outcome::Ok(_) => {
                self.store.write_ahead(op_id, &outcome).await?;
                match self.store.finalize(op_id, OperationState::Completed).await {
                    Ok(()) => {
                        metrics::operations_completed_total()
                            .add(1, &[KeyValue::new("path", "queue")]);
                    }
                    Err(OrchestratorError::AlreadyFinalized { state, .. }) => {
                        debug!(
                            op_id = %op_id,
                            state = %state,
                            "Duplicate delivery of a finalized operation"
                        );
                        return Ok(Disposition::AlreadyFinalized);
                    }
                    Err(err) => {
                        warn!(
                            op_id = %op_id,
                            error = %err,
                            "⚠️ QUEUE WORKER: Finalize failed after write-ahead, left for finalizer"
                        );
                    }
                }
                debug!(op_id = %op_id, "✅ QUEUE WORKER: Operation completed");
                Ok(Disposition::Completed)
            }
            Outcome::Retry(retry) => {
                let attempt = retry.attempt_count();
                if attempt < self.config.max_retries() {
                    let delay = self.backoff.calculate_duration(attempt)?;
                    self.bus.publish(envelope, delay).await?;
                    metrics::retries_scheduled_total().add(1, &[]);
                    info!(
                        op_id = %op_id,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = retry.reason().unwrap_or("unspecified"),
                        "🔄 QUEUE WORKER: Retry scheduled"
                    );
                    Ok(Disposition::RetryScheduled { attempt, delay })
                } else {
                    if !self.finalize_failed(op_id, "retries_exhausted").await? {
                        return Ok(Disposition::AlreadyFinalized);
                    }
                    warn!(
                        op_id = %op_id,
                        attempt = attempt,
                        max_retries = self.config.max_retries(),
                        "QUEUE WORKER: Retries exhausted, operation failed"
                    );
                    Ok(Disposition::RetriesExhausted { attempt })
                }
            }
            Outcome::Fail(fail) => {
                if !self.finalize_failed(op_id, "fail").await? {
                    return Ok(Disposition::AlreadyFinalized);
                }
                let dead_lettered = self.config.dlq_enabled();
                if dead_lettered {
                    self.bus.publish_to_dlq(envelope, &fail).await?;
                    metrics::dlq_published_total().add(1, &[]);
                }
                warn!(
                    op_id = %op_id,
                    error_code = fail.error_code(),
                    message = fail.message(),
                    dead_lettered = dead_lettered,
                    "❌ QUEUE WORKER: Operation failed"
                );
                Ok(Disposition::Failed { dead_lettered })
            }
        }
    }

    /// Finalize as failed. Returns `false` when another delivery already
    /// finalized the operation.
    async fn finalize_failed(
        &self,
        op_id: &OpId,
        reason: &'static str,
    ) -> OrchestratorResult<bool> {
        match self.store.finalize(op_id, OperationState::Failed).await {
            Ok(()) => {
                metrics::operations_failed_total().add(1, &[KeyValue::new("reason", reason)]);
                Ok(true)
            }
            Err(OrchestratorError::AlreadyFinalized { state, .. }) => {
                debug!(
                    op_id = %op_id,
                    state = %state,
                    "Duplicate delivery of a finalized operation"
                );
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

/// Bounded worker pool over a [`Bus`]
pub struct QueueWorkerRunner {
    context: Arc<WorkerContext>,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<EnvelopeReport>>,
    accepting: AtomicBool,
}

impl fmt::Debug for QueueWorkerRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueWorkerRunner")
            .field("config", &self.context.config)
            .field("available_permits", &self.permits.available_permits())
            .field("accepting", &self.accepting.load(Ordering::Acquire))
            .finish()
    }
}

impl QueueWorkerRunner {
    pub fn new(
        bus: Arc<dyn Bus>,
        store: Arc<dyn Store>,
        executor: Arc<dyn Executor>,
        backoff: BackoffCalculator,
        config: QueueWorkerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency()));
        Self {
            context: Arc::new(WorkerContext {
                bus,
                store,
                executor,
                backoff,
                config,
                state_poll_interval: DEFAULT_STATE_POLL_INTERVAL,
            }),
            permits,
            tasks: Mutex::new(JoinSet::new()),
            accepting: AtomicBool::new(true),
        }
    }

    /// Override how often executor state is checked while waiting.
    /// Must be called before the first pump.
    #[must_use]
    pub fn with_state_poll_interval(mut self, interval: Duration) -> Self {
        if let Some(context) = Arc::get_mut(&mut self.context) {
            context.state_poll_interval = interval;
        }
        self
    }

    pub fn config(&self) -> &QueueWorkerConfig {
        &self.context.config
    }

    /// Worker tasks spawned and not yet drained
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Dequeue one batch and hand it to the pool without waiting for it
    pub async fn dispatch(&self) -> OrchestratorResult<usize> {
        if !self.accepting.load(Ordering::Acquire) {
            return Ok(0);
        }

        let envelopes = self.context.bus.dequeue(self.context.config.batch_size()).await?;
        let count = envelopes.len();
        if count == 0 {
            return Ok(0);
        }
        debug!(count = count, "📥 QUEUE WORKER: Dequeued batch");

        let mut tasks = self.tasks.lock();
        for envelope in envelopes {
            let context = Arc::clone(&self.context);
            let permits = Arc::clone(&self.permits);
            tasks.spawn(async move {
                let op_id = envelope.op_id.clone();
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => context.process(envelope).await,
                    Err(_) => {
                        if let Err(err) = context.bus.nack(&envelope).await {
                            error!(op_id = %op_id, error = %err, "Failed to nack envelope");
                        }
                        Err(OrchestratorError::internal("worker pool closed"))
                    }
                };
                EnvelopeReport { op_id, result }
            });
        }
        Ok(count)
    }

    /// Wait for every spawned worker task and summarize the results
    pub async fn drain(&self) -> PumpSummary {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let mut summary = PumpSummary::default();
        while let Some(joined) = tasks.join_next().await {
            record_joined(&mut summary, joined);
        }
        summary
    }

    /// Stop accepting new batches and wait up to `grace` for in-flight work.
    ///
    /// Tasks still running after the grace period are aborted; their envelopes
    /// are redelivered once the bus visibility timeout expires.
    pub async fn shutdown(&self, grace: Duration) -> PumpSummary {
        self.accepting.store(false, Ordering::Release);
        info!(grace_ms = grace.as_millis() as u64, "🛑 QUEUE WORKER: Shutting down");

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let mut summary = PumpSummary::default();
        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(joined) => record_joined(&mut summary, joined),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(
                        aborted = tasks.len(),
                        "QUEUE WORKER: Grace period elapsed, aborting in-flight tasks"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }
        summary
    }

    /// Pump at the configured polling interval until `shutdown` fires
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.context.config.polling_interval();
        info!(
            polling_interval_ms = self.context.config.polling_interval_ms(),
            concurrency = self.context.config.concurrency(),
            "🚀 QUEUE WORKER: Starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("QUEUE WORKER: Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match self.pump().await {
                        Ok(summary) if summary.dequeued > 0 => {
                            info!(
                                dequeued = summary.dequeued,
                                completed = summary.completed,
                                retries = summary.retries_scheduled,
                                failed = summary.failed,
                                errors = summary.errors,
                                "QUEUE WORKER: Pump cycle finished"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => error!(error = %err, "QUEUE WORKER: Pump cycle failed"),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Runtime for QueueWorkerRunner {
    async fn pump(&self) -> OrchestratorResult<PumpSummary> {
        let dequeued = self.dispatch().await?;
        if dequeued == 0 {
            return Ok(PumpSummary::default());
        }
        let mut summary = self.drain().await;
        summary.dequeued = dequeued;
        Ok(summary)
    }
}

fn record_joined(
    summary: &mut PumpSummary,
    joined: Result<EnvelopeReport, tokio::task::JoinError>,
) {
    match joined {
        Ok(report) => {
            if let Err(err) = &report.result {
                debug!(op_id = %report.op_id, error = %err, "Worker task reported an error");
            }
            summary.record(&report.result);
        }
        Err(join_err) => {
            error!(error = %join_err, "Worker task panicked or was cancelled");
            summary.errors += 1;
        }
    }
}
