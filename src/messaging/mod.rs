//! # Bus SPI
//!
//! Queue semantics the queue worker consumes: delayed publish, batch dequeue
//! with a visibility timeout, ack, nack and a dead-letter queue.

use crate::error::OrchestratorResult;
use crate::models::{Envelope, Fail};
use async_trait::async_trait;
use std::time::Duration;

pub mod in_memory;

pub use in_memory::{DeadLetter, InMemoryBus};

/// Provider-agnostic message bus
///
/// Delivery is at-least-once: a dequeued envelope that is neither acked nor
/// nacked before its visibility timeout expires is delivered again.
#[async_trait]
pub trait Bus: Send + Sync + 'static {
    /// Publish an envelope, visible to consumers after `delay`
    async fn publish(&self, envelope: &Envelope, delay: Duration) -> OrchestratorResult<()>;

    /// Receive up to `batch_size` visible envelopes and mark them in flight
    async fn dequeue(&self, batch_size: usize) -> OrchestratorResult<Vec<Envelope>>;

    /// Acknowledge processing; the envelope leaves the in-flight set
    async fn ack(&self, envelope: &Envelope) -> OrchestratorResult<()>;

    /// Reject processing; the envelope leaves the in-flight set and is
    /// republished with zero delay
    async fn nack(&self, envelope: &Envelope) -> OrchestratorResult<()>;

    /// Park a permanently failed envelope in the dead-letter queue
    async fn publish_to_dlq(&self, envelope: &Envelope, fail: &Fail) -> OrchestratorResult<()>;
}
