//! # Orchestrator Metrics
//!
//! OpenTelemetry instruments for the runners and sweepers. Instruments come
//! from the global meter provider, so they are no-ops until the host installs
//! one.
//!
//! ## Usage
//!
//! ```rust
//! use orchestrator_core::metrics;
//! use opentelemetry::KeyValue;
//!
//! metrics::operations_completed_total().add(1, &[KeyValue::new("path", "queue")]);
//! metrics::processing_duration().record(12.5, &[]);
//! ```

use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::sync::OnceLock;

/// Lazy-initialized meter for orchestrator metrics
static ORCHESTRATOR_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    ORCHESTRATOR_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("orchestrator-core"))
}

// Counters

/// Operations finalized as completed
///
/// Labels:
/// - path: `queue`, `fast_path` or `finalizer`
pub fn operations_completed_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.operations.completed.total")
        .with_description("Operations finalized as completed")
        .build()
}

/// Operations finalized as failed
///
/// Labels:
/// - reason: `fail`, `retries_exhausted`, `reaped` or `recovered`
pub fn operations_failed_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.operations.failed.total")
        .with_description("Operations finalized as failed")
        .build()
}

/// Retries scheduled with backoff
pub fn retries_scheduled_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.retries.scheduled.total")
        .with_description("Retries republished with backoff")
        .build()
}

/// Envelopes moved to the dead-letter queue
pub fn dlq_published_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.dlq.published.total")
        .with_description("Envelopes moved to the dead-letter queue")
        .build()
}

/// Envelope processing errors that led to a nack
pub fn processing_errors_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.processing.errors.total")
        .with_description("Envelope processing errors that led to a nack")
        .build()
}

/// Pending write-ahead entries finalized by the finalizer
pub fn finalizer_recovered_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.finalizer.recovered.total")
        .with_description("Pending write-ahead entries finalized by the finalizer")
        .build()
}

/// Stuck operations reconciled by the reaper
///
/// Labels:
/// - strategy: `retry` or `fail`
pub fn reaper_reconciled_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.reaper.reconciled.total")
        .with_description("Stuck operations reconciled by the reaper")
        .build()
}

/// Fast-path submissions by result
///
/// Labels:
/// - result: `completed` or `async`
pub fn fast_path_submissions_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.fast_path.submissions.total")
        .with_description("Fast-path submissions by result")
        .build()
}

/// Dispatches rejected by a protection hook
///
/// Labels:
/// - hook: `timeout`, `circuit_breaker`, `bulkhead` or `rate_limiter`
pub fn protection_rejections_total() -> Counter<u64> {
    meter()
        .u64_counter("orchestrator.protection.rejections.total")
        .with_description("Dispatches rejected by a protection hook")
        .build()
}

// Histograms

/// Time from dequeue to ack/nack for one envelope, in milliseconds
pub fn processing_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("orchestrator.processing.duration")
        .with_description("Time from dequeue to ack or nack for one envelope")
        .with_unit("ms")
        .build()
}
