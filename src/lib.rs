#![allow(clippy::doc_markdown)] // Allow technical terms like OpId, WAL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Orchestrator Core
//!
//! Asynchronous operation orchestrator with a crash-safe write-ahead
//! finalization protocol.
//!
//! ## Overview
//!
//! Callers submit a [`Command`](models::Command); the orchestrator assigns it
//! an [`OpId`](models::OpId), dispatches it to an [`Executor`](executor::Executor)
//! and drives it to exactly one terminal state. Two paths share the same
//! guarantees:
//!
//! - **Fast path**: [`InlineFastPathRunner`](orchestration::InlineFastPathRunner)
//!   waits on the caller's task for a short time budget and hands off to a
//!   status URL when the budget runs out
//! - **Queue path**: [`QueueWorkerRunner`](orchestration::QueueWorkerRunner)
//!   consumes envelopes from a [`Bus`](messaging::Bus) on a bounded worker
//!   pool, with exponential backoff retries and dead-lettering
//!
//! ## Crash Safety
//!
//! Successful outcomes are recorded with `Store::write_ahead` before
//! `Store::finalize`. The [`Finalizer`](orchestration::Finalizer) completes
//! write-ahead rows whose finalize never happened, and the
//! [`Reaper`](orchestration::Reaper) reconciles operations stuck in progress.
//! `finalize` is atomic per operation, so any number of runners and
//! sweepers can share one store.
//!
//! ## Module Organization
//!
//! - [`models`] - Identifiers, commands, envelopes and outcomes
//! - [`state_machine`] - Operation states and the legal transitions between them
//! - [`store`] - Store SPI and the in-memory adapter
//! - [`messaging`] - Bus SPI and the in-memory adapter
//! - [`executor`] - Executor SPI and the protected executor decorator
//! - [`resilience`] - Circuit breaker, timeout, bulkhead, rate limiter and hedging hooks
//! - [`orchestration`] - Runners, sweepers and backoff
//! - [`idempotency`] - Idempotency key registry
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Structured error handling
//! - [`logging`] / [`metrics`] - Tracing setup and OpenTelemetry instruments
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orchestrator_core::models::Command;
//! use orchestrator_core::orchestration::{FastPathConfig, InlineFastPathRunner, Orchestrator};
//! use orchestrator_core::test_helpers::ScriptedExecutor;
//! use std::sync::Arc;
//!
//! # async fn example() -> orchestrator_core::OrchestratorResult<()> {
//! let executor = Arc::new(ScriptedExecutor::always_ok());
//! let runner = InlineFastPathRunner::new(executor, FastPathConfig::default());
//!
//! let command = Command::parse("ORDERS", "ORDER_PLACED", "order-42", "idem-42", "{}")?;
//! let handle = runner.submit(command, 200).await?;
//! if let Some(outcome) = handle.outcome() {
//!     println!("finished inline: {outcome}");
//! } else if let Some(url) = handle.status_url() {
//!     println!("poll {url}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod idempotency;
pub mod logging;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod state_machine;
pub mod store;
pub mod test_helpers;

pub use config::{ConfigManager, ConfigurationError, OrchestratorConfig};
pub use error::{OrchestratorError, OrchestratorResult};
pub use executor::{Executor, ProtectedExecutor};
pub use idempotency::{IdempotencyManager, InMemoryIdempotencyManager};
pub use messaging::{Bus, InMemoryBus};
pub use models::{Command, Envelope, Fail, IdempotencyKey, OpId, Outcome, Retry, Success};
pub use orchestration::{
    BackoffCalculator, Finalizer, InlineFastPathRunner, OperationHandle, Orchestrator,
    QueueWorkerRunner, Reaper, Runtime,
};
pub use state_machine::{OperationState, StateTransition, WriteAheadState};
pub use store::{InMemoryStore, Store};
