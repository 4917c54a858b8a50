//! # In-Memory Bus
//!
//! Thread-safe queue implementation for testing and development.
//!
//! ## Features
//!
//! - **Delayed Delivery**: Envelopes become visible after their publish delay
//! - **Visibility Timeout**: Dequeued envelopes that are never acked or nacked
//!   are reclaimed and redelivered
//! - **Dead-Letter Queue**: Failed envelopes are kept with their failure and a timestamp

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::Bus;
use crate::error::OrchestratorResult;
use crate::models::{Envelope, Fail, OpId};

/// Default visibility timeout for dequeued envelopes
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct ScheduledEnvelope {
    visible_at: Instant,
    sequence: u64,
    envelope: Envelope,
}

impl PartialEq for ScheduledEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.visible_at == other.visible_at && self.sequence == other.sequence
    }
}

impl Eq for ScheduledEnvelope {}

impl PartialOrd for ScheduledEnvelope {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEnvelope {
    // Reversed so the max-heap pops the earliest visible envelope first
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .visible_at
            .cmp(&self.visible_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    envelope: Envelope,
    deadline: Instant,
}

/// Dead-letter queue entry
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub envelope: Envelope,
    pub fail: Fail,
    pub dead_lettered_at: DateTime<Utc>,
}

/// In-memory implementation of the [`Bus`] SPI
#[derive(Debug)]
pub struct InMemoryBus {
    ready: Mutex<BinaryHeap<ScheduledEnvelope>>,
    in_flight: DashMap<OpId, InFlight>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    visibility_timeout: Duration,
    next_sequence: AtomicU64,
    total_published: AtomicU64,
    total_acked: AtomicU64,
    total_nacked: AtomicU64,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            ready: Mutex::new(BinaryHeap::new()),
            in_flight: DashMap::new(),
            dead_letters: Mutex::new(Vec::new()),
            visibility_timeout,
            next_sequence: AtomicU64::new(0),
            total_published: AtomicU64::new(0),
            total_acked: AtomicU64::new(0),
            total_nacked: AtomicU64::new(0),
        }
    }

    fn schedule(&self, envelope: Envelope, visible_at: Instant) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.ready.lock().push(ScheduledEnvelope {
            visible_at,
            sequence,
            envelope,
        });
    }

    /// Return every in-flight envelope whose visibility timeout expired to
    /// the ready queue. Returns the number reclaimed.
    pub fn process_visibility_timeouts(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<OpId> = self
            .in_flight
            .iter()
            .filter(|entry| entry.value().deadline <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut reclaimed = 0;
        for op_id in expired {
            if let Some((_, in_flight)) = self
                .in_flight
                .remove_if(&op_id, |_, in_flight| in_flight.deadline <= now)
            {
                warn!(op_id = %op_id, "⏰ Visibility timeout expired, redelivering");
                self.schedule(in_flight.envelope, now);
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Force the visibility timeout of an in-flight envelope to expire now
    /// (for testing). Returns false when the envelope is not in flight.
    pub fn expire_visibility_timeout(&self, op_id: &OpId) -> bool {
        match self.in_flight.get_mut(op_id) {
            Some(mut in_flight) => {
                in_flight.deadline = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Number of envelopes waiting in the queue, visible or delayed
    pub fn queue_size(&self) -> usize {
        self.ready.lock().len()
    }

    pub fn in_flight_size(&self) -> usize {
        self.in_flight.len()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().clone()
    }

    pub fn dlq_size(&self) -> usize {
        self.dead_letters.lock().len()
    }

    pub fn total_published(&self) -> u64 {
        self.total_published.load(Ordering::Relaxed)
    }

    pub fn total_acked(&self) -> u64 {
        self.total_acked.load(Ordering::Relaxed)
    }

    pub fn total_nacked(&self) -> u64 {
        self.total_nacked.load(Ordering::Relaxed)
    }

    /// Drop all queued, in-flight and dead-lettered envelopes (for testing)
    pub fn clear(&self) {
        self.ready.lock().clear();
        self.in_flight.clear();
        self.dead_letters.lock().clear();
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    async fn publish(&self, envelope: &Envelope, delay: Duration) -> OrchestratorResult<()> {
        self.schedule(envelope.clone(), Instant::now() + delay);
        self.total_published.fetch_add(1, Ordering::Relaxed);
        debug!(
            op_id = %envelope.op_id,
            delay_ms = delay.as_millis() as u64,
            "📤 Envelope published"
        );
        Ok(())
    }

    async fn dequeue(&self, batch_size: usize) -> OrchestratorResult<Vec<Envelope>> {
        self.process_visibility_timeouts();

        let now = Instant::now();
        let mut batch = Vec::with_capacity(batch_size);
        {
            let mut ready = self.ready.lock();
            while batch.len() < batch_size {
                match ready.peek() {
                    Some(next) if next.visible_at <= now => {}
                    _ => break,
                }
                if let Some(scheduled) = ready.pop() {
                    batch.push(scheduled.envelope);
                }
            }
        }

        let deadline = now + self.visibility_timeout;
        for envelope in &batch {
            self.in_flight.insert(
                envelope.op_id.clone(),
                InFlight {
                    envelope: envelope.clone(),
                    deadline,
                },
            );
        }

        if !batch.is_empty() {
            debug!(count = batch.len(), "📥 Envelopes dequeued");
        }
        Ok(batch)
    }

    async fn ack(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        if self.in_flight.remove(&envelope.op_id).is_none() {
            debug!(op_id = %envelope.op_id, "Ack for envelope that is no longer in flight");
        }
        self.total_acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        self.in_flight.remove(&envelope.op_id);
        self.total_nacked.fetch_add(1, Ordering::Relaxed);
        self.publish(envelope, Duration::ZERO).await
    }

    async fn publish_to_dlq(&self, envelope: &Envelope, fail: &Fail) -> OrchestratorResult<()> {
        self.in_flight.remove(&envelope.op_id);
        self.dead_letters.lock().push(DeadLetter {
            envelope: envelope.clone(),
            fail: fail.clone(),
            dead_lettered_at: Utc::now(),
        });
        warn!(
            op_id = %envelope.op_id,
            error_code = fail.error_code(),
            "☠️ Envelope moved to dead-letter queue"
        );
        Ok(())
    }
}
