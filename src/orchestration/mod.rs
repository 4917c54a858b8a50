//! # Orchestration Runners
//!
//! The runners that drive operations from acceptance to a terminal state.
//!
//! ## Core Components
//!
//! - **QueueWorkerRunner**: Dequeues envelopes and settles them on a bounded
//!   worker pool, applying retries with backoff and dead-lettering failures
//! - **InlineFastPathRunner**: Executes a command on the caller's task and
//!   hands off to an async status URL when the time budget runs out
//! - **Finalizer**: Recovers outcomes recorded in the write-ahead log whose
//!   finalize never happened
//! - **Reaper**: Reconciles operations stuck in progress past a threshold
//! - **BackoffCalculator**: Exponential retry delays with jitter
//!
//! ## Write-Ahead Protocol
//!
//! A successful outcome is always recorded with `Store::write_ahead` before
//! `Store::finalize` moves the operation to its terminal state. A crash
//! between the two leaves a pending WAL row that the finalizer completes, so
//! an accepted outcome is never lost and an operation is finalized once.

pub mod backoff_calculator;
pub mod completion;
pub mod config;
pub mod fast_path;
pub mod finalizer;
pub mod operation_handle;
pub mod queue_worker;
pub mod reaper;

pub use backoff_calculator::{BackoffCalculator, BackoffConfig};
pub use completion::await_terminal_state;
pub use config::{
    FastPathConfig, FinalizerConfig, QueueWorkerConfig, ReaperConfig, ReconcileStrategy,
    MAX_TIME_BUDGET_MS, MIN_TIME_BUDGET_MS,
};
pub use fast_path::{InlineFastPathRunner, Orchestrator};
pub use finalizer::{Finalizer, FinalizerScanSummary};
pub use operation_handle::OperationHandle;
pub use queue_worker::{Disposition, EnvelopeReport, PumpSummary, QueueWorkerRunner, Runtime};
pub use reaper::{Reaper, ReaperScanSummary};
