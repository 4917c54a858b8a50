//! # Runner Configuration
//!
//! Immutable, eagerly validated configuration value objects for the queue
//! worker, the finalizer, the reaper and the inline fast path.
//!
//! ## Usage
//!
//! ```rust
//! use orchestrator_core::orchestration::config::{
//!     QueueWorkerConfig, ReaperConfig, ReconcileStrategy,
//! };
//!
//! let worker = QueueWorkerConfig::default().with_concurrency(16).unwrap();
//! assert_eq!(worker.concurrency(), 16);
//! assert_eq!(worker.batch_size(), 10);
//!
//! let reaper = ReaperConfig::default();
//! assert_eq!(reaper.default_strategy(), ReconcileStrategy::Fail);
//! assert!(QueueWorkerConfig::default().with_batch_size(0).is_err());
//! ```
//!
//! Every type derives `Deserialize` with field defaults so partial sections
//! can be loaded from a file. Deserialized values are checked by the
//! configuration manager through `validate()`.

use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

fn require_positive(field: &str, value: u64) -> OrchestratorResult<()> {
    if value == 0 {
        return Err(OrchestratorError::validation(field, "must be greater than 0"));
    }
    Ok(())
}

/// Queue worker runner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueWorkerConfig {
    polling_interval_ms: u64,
    batch_size: usize,
    concurrency: usize,
    max_processing_time_ms: u64,
    max_retries: u32,
    dlq_enabled: bool,
}

impl Default for QueueWorkerConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: 100,
            batch_size: 10,
            concurrency: 5,
            max_processing_time_ms: 30_000,
            max_retries: 3,
            dlq_enabled: true,
        }
    }
}

impl QueueWorkerConfig {
    pub fn new(
        polling_interval_ms: u64,
        batch_size: usize,
        concurrency: usize,
        max_processing_time_ms: u64,
        max_retries: u32,
        dlq_enabled: bool,
    ) -> OrchestratorResult<Self> {
        let config = Self {
            polling_interval_ms,
            batch_size,
            concurrency,
            max_processing_time_ms,
            max_retries,
            dlq_enabled,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        require_positive("polling_interval_ms", self.polling_interval_ms)?;
        require_positive("batch_size", self.batch_size as u64)?;
        require_positive("concurrency", self.concurrency as u64)?;
        require_positive("max_processing_time_ms", self.max_processing_time_ms)?;
        require_positive("max_retries", u64::from(self.max_retries))?;
        Ok(())
    }

    pub fn polling_interval_ms(&self) -> u64 {
        self.polling_interval_ms
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn max_processing_time_ms(&self) -> u64 {
        self.max_processing_time_ms
    }

    pub fn max_processing_time(&self) -> Duration {
        Duration::from_millis(self.max_processing_time_ms)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn dlq_enabled(&self) -> bool {
        self.dlq_enabled
    }

    pub fn with_polling_interval_ms(self, polling_interval_ms: u64) -> OrchestratorResult<Self> {
        Self::new(
            polling_interval_ms,
            self.batch_size,
            self.concurrency,
            self.max_processing_time_ms,
            self.max_retries,
            self.dlq_enabled,
        )
    }

    pub fn with_batch_size(self, batch_size: usize) -> OrchestratorResult<Self> {
        Self::new(
            self.polling_interval_ms,
            batch_size,
            self.concurrency,
            self.max_processing_time_ms,
            self.max_retries,
            self.dlq_enabled,
        )
    }

    pub fn with_concurrency(self, concurrency: usize) -> OrchestratorResult<Self> {
        Self::new(
            self.polling_interval_ms,
            self.batch_size,
            concurrency,
            self.max_processing_time_ms,
            self.max_retries,
            self.dlq_enabled,
        )
    }

    pub fn with_max_processing_time_ms(
        self,
        max_processing_time_ms: u64,
    ) -> OrchestratorResult<Self> {
        Self::new(
            self.polling_interval_ms,
            self.batch_size,
            self.concurrency,
            max_processing_time_ms,
            self.max_retries,
            self.dlq_enabled,
        )
    }

    pub fn with_max_retries(self, max_retries: u32) -> OrchestratorResult<Self> {
        Self::new(
            self.polling_interval_ms,
            self.batch_size,
            self.concurrency,
            self.max_processing_time_ms,
            max_retries,
            self.dlq_enabled,
        )
    }

    pub fn with_dlq_enabled(self, dlq_enabled: bool) -> Self {
        Self {
            dlq_enabled,
            ..self
        }
    }
}

/// Write-ahead log recovery sweep settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizerConfig {
    scan_interval_ms: u64,
    batch_size: usize,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 60_000,
            batch_size: 100,
        }
    }
}

impl FinalizerConfig {
    pub fn new(scan_interval_ms: u64, batch_size: usize) -> OrchestratorResult<Self> {
        let config = Self {
            scan_interval_ms,
            batch_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        require_positive("scan_interval_ms", self.scan_interval_ms)?;
        require_positive("batch_size", self.batch_size as u64)
    }

    pub fn scan_interval_ms(&self) -> u64 {
        self.scan_interval_ms
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn with_scan_interval_ms(self, scan_interval_ms: u64) -> OrchestratorResult<Self> {
        Self::new(scan_interval_ms, self.batch_size)
    }

    pub fn with_batch_size(self, batch_size: usize) -> OrchestratorResult<Self> {
        Self::new(self.scan_interval_ms, batch_size)
    }
}

/// How the reaper reconciles an operation stuck in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStrategy {
    /// Republish the original envelope with zero delay
    Retry,
    /// Force the operation to `Failed`
    Fail,
}

impl fmt::Display for ReconcileStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "retry"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Stuck-operation sweep settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    scan_interval_ms: u64,
    timeout_threshold_ms: u64,
    batch_size: usize,
    default_strategy: ReconcileStrategy,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 300_000,
            timeout_threshold_ms: 600_000,
            batch_size: 50,
            default_strategy: ReconcileStrategy::Fail,
        }
    }
}

impl ReaperConfig {
    pub fn new(
        scan_interval_ms: u64,
        timeout_threshold_ms: u64,
        batch_size: usize,
        default_strategy: ReconcileStrategy,
    ) -> OrchestratorResult<Self> {
        let config = Self {
            scan_interval_ms,
            timeout_threshold_ms,
            batch_size,
            default_strategy,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        require_positive("scan_interval_ms", self.scan_interval_ms)?;
        require_positive("timeout_threshold_ms", self.timeout_threshold_ms)?;
        require_positive("batch_size", self.batch_size as u64)
    }

    pub fn scan_interval_ms(&self) -> u64 {
        self.scan_interval_ms
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn timeout_threshold_ms(&self) -> u64 {
        self.timeout_threshold_ms
    }

    pub fn timeout_threshold(&self) -> Duration {
        Duration::from_millis(self.timeout_threshold_ms)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn default_strategy(&self) -> ReconcileStrategy {
        self.default_strategy
    }

    pub fn with_scan_interval_ms(self, scan_interval_ms: u64) -> OrchestratorResult<Self> {
        Self::new(
            scan_interval_ms,
            self.timeout_threshold_ms,
            self.batch_size,
            self.default_strategy,
        )
    }

    pub fn with_timeout_threshold_ms(self, timeout_threshold_ms: u64) -> OrchestratorResult<Self> {
        Self::new(
            self.scan_interval_ms,
            timeout_threshold_ms,
            self.batch_size,
            self.default_strategy,
        )
    }

    pub fn with_batch_size(self, batch_size: usize) -> OrchestratorResult<Self> {
        Self::new(
            self.scan_interval_ms,
            self.timeout_threshold_ms,
            batch_size,
            self.default_strategy,
        )
    }

    pub fn with_strategy(self, default_strategy: ReconcileStrategy) -> Self {
        Self {
            default_strategy,
            ..self
        }
    }
}

/// Lower bound for a fast-path time budget
pub const MIN_TIME_BUDGET_MS: u64 = 50;
/// Upper bound for a fast-path time budget
pub const MAX_TIME_BUDGET_MS: u64 = 5_000;

/// Inline fast path settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastPathConfig {
    poll_interval_ms: u64,
    default_time_budget_ms: u64,
    status_url_base: String,
}

impl Default for FastPathConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            default_time_budget_ms: 200,
            status_url_base: "/api/operations".to_string(),
        }
    }
}

impl FastPathConfig {
    pub fn new(
        poll_interval_ms: u64,
        default_time_budget_ms: u64,
        status_url_base: impl Into<String>,
    ) -> OrchestratorResult<Self> {
        let config = Self {
            poll_interval_ms,
            default_time_budget_ms,
            status_url_base: status_url_base.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        require_positive("poll_interval_ms", self.poll_interval_ms)?;
        Self::validate_time_budget(self.default_time_budget_ms)?;
        if self.status_url_base.trim().is_empty() {
            return Err(OrchestratorError::validation(
                "status_url_base",
                "must not be blank",
            ));
        }
        Ok(())
    }

    /// Check a time budget against the accepted `[50, 5000]` millisecond range
    pub fn validate_time_budget(time_budget_ms: u64) -> OrchestratorResult<()> {
        if !(MIN_TIME_BUDGET_MS..=MAX_TIME_BUDGET_MS).contains(&time_budget_ms) {
            let range = format!("{MIN_TIME_BUDGET_MS} and {MAX_TIME_BUDGET_MS}");
            return Err(OrchestratorError::validation(
                "time_budget_ms",
                format!("must be between {range}, got {time_budget_ms}"),
            ));
        }
        Ok(())
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn default_time_budget_ms(&self) -> u64 {
        self.default_time_budget_ms
    }

    pub fn status_url_base(&self) -> &str {
        &self.status_url_base
    }

    pub fn with_poll_interval_ms(self, poll_interval_ms: u64) -> OrchestratorResult<Self> {
        Self::new(
            poll_interval_ms,
            self.default_time_budget_ms,
            self.status_url_base,
        )
    }

    pub fn with_default_time_budget_ms(
        self,
        default_time_budget_ms: u64,
    ) -> OrchestratorResult<Self> {
        Self::new(
            self.poll_interval_ms,
            default_time_budget_ms,
            self.status_url_base,
        )
    }
}
