//! Test data builders shared by the integration suites.

#![allow(dead_code)]

use orchestrator_core::messaging::{Bus, InMemoryBus};
use orchestrator_core::models::{Command, Envelope, OpId};
use orchestrator_core::orchestration::{BackoffCalculator, QueueWorkerConfig, QueueWorkerRunner};
use orchestrator_core::store::InMemoryStore;
use orchestrator_core::test_helpers::ScriptedExecutor;
use std::sync::Arc;
use std::time::Duration;

/// A command with fixed domain fields and the given idempotency key
pub fn command(idem_key: &str) -> Command {
    Command::parse("ORDERS", "ORDER_PLACED", "order-1001", idem_key, "{\"sku\":\"A-1\"}")
        .expect("valid command")
}

pub fn envelope(op_id: &str) -> Envelope {
    Envelope::now(OpId::new(op_id).expect("valid op id"), command(op_id))
}

/// Backoff without jitter so delays are predictable
pub fn fixed_backoff() -> BackoffCalculator {
    BackoffCalculator::new(100, 10_000, 0.0).expect("valid backoff")
}

/// In-memory store and bus with helpers for accepting operations
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub bus: Arc<InMemoryBus>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            bus: Arc::new(InMemoryBus::new()),
        }
    }

    /// Register an envelope with the store and publish it
    pub async fn accept(&self, op_id: &str) -> Envelope {
        let envelope = envelope(op_id);
        self.store.save_envelope(envelope.clone());
        self.bus
            .publish(&envelope, Duration::ZERO)
            .await
            .expect("publish");
        envelope
    }

    pub fn worker(
        &self,
        executor: Arc<ScriptedExecutor>,
        config: QueueWorkerConfig,
    ) -> QueueWorkerRunner {
        QueueWorkerRunner::new(
            self.bus.clone(),
            self.store.clone(),
            executor,
            fixed_backoff(),
            config,
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
