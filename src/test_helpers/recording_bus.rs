//! Bus wrapper that records every call.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::messaging::Bus;
use crate::models::{Envelope, Fail, OpId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One recorded bus interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    Publish { envelope: Envelope, delay: Duration },
    Dequeue { delivered: usize },
    Ack { op_id: OpId },
    Nack { op_id: OpId },
    DeadLetter { op_id: OpId, error_code: String },
}

/// Delegates to an inner [`Bus`] and records what was asked of it
pub struct RecordingBus {
    inner: Arc<dyn Bus>,
    calls: Mutex<Vec<BusCall>>,
    failing_publishes: AtomicUsize,
}

impl std::fmt::Debug for RecordingBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBus")
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

impl RecordingBus {
    pub fn new(inner: Arc<dyn Bus>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failing_publishes: AtomicUsize::new(0),
        }
    }

    /// Fail the next `times` publish calls without reaching the inner bus
    pub fn fail_next_publishes(&self, times: usize) {
        self.failing_publishes.fetch_add(times, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.calls.lock().clone()
    }

    /// Successful publishes as `(envelope, delay)` pairs
    pub fn publishes(&self) -> Vec<(Envelope, Duration)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                BusCall::Publish { envelope, delay } => Some((envelope.clone(), *delay)),
                _ => None,
            })
            .collect()
    }

    pub fn acks(&self) -> usize {
        self.count(|call| matches!(call, BusCall::Ack { .. }))
    }

    pub fn nacks(&self) -> usize {
        self.count(|call| matches!(call, BusCall::Nack { .. }))
    }

    pub fn dead_letters(&self) -> usize {
        self.count(|call| matches!(call, BusCall::DeadLetter { .. }))
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn count(&self, predicate: impl Fn(&BusCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: BusCall) {
        self.calls.lock().push(call);
    }

    fn take_publish_failure(&self) -> bool {
        self.failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Bus for RecordingBus {
    async fn publish(&self, envelope: &Envelope, delay: Duration) -> OrchestratorResult<()> {
        if self.take_publish_failure() {
            return Err(OrchestratorError::messaging("publish", "injected fault"));
        }
        self.inner.publish(envelope, delay).await?;
        self.record(BusCall::Publish {
            envelope: envelope.clone(),
            delay,
        });
        Ok(())
    }

    async fn dequeue(&self, batch_size: usize) -> OrchestratorResult<Vec<Envelope>> {
        let envelopes = self.inner.dequeue(batch_size).await?;
        if !envelopes.is_empty() {
            self.record(BusCall::Dequeue {
                delivered: envelopes.len(),
            });
        }
        Ok(envelopes)
    }

    async fn ack(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        self.inner.ack(envelope).await?;
        self.record(BusCall::Ack {
            op_id: envelope.op_id.clone(),
        });
        Ok(())
    }

    async fn nack(&self, envelope: &Envelope) -> OrchestratorResult<()> {
        self.inner.nack(envelope).await?;
        self.record(BusCall::Nack {
            op_id: envelope.op_id.clone(),
        });
        Ok(())
    }

    async fn publish_to_dlq(&self, envelope: &Envelope, fail: &Fail) -> OrchestratorResult<()> {
        self.inner.publish_to_dlq(envelope, fail).await?;
        self.record(BusCall::DeadLetter {
            op_id: envelope.op_id.clone(),
            error_code: fail.error_code().to_string(),
        });
        Ok(())
    }
}
