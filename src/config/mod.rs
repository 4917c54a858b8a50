//! # Configuration
//!
//! Aggregate configuration for every runner, sweeper and protection hook.
//! Each section deserializes with defaults for missing fields and is
//! validated as a whole by [`OrchestratorConfig::validate`].
//!
//! ```toml
//! [queue_worker]
//! batch_size = 20
//! concurrency = 8
//!
//! [reaper]
//! default_strategy = "retry"
//!
//! [protection.circuit_breaker]
//! failure_threshold = 3
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::error::OrchestratorResult;
use crate::orchestration::{
    BackoffConfig, FastPathConfig, FinalizerConfig, QueueWorkerConfig, ReaperConfig,
};
use crate::resilience::ProtectionConfig;
use serde::{Deserialize, Serialize};

/// Complete orchestrator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub queue_worker: QueueWorkerConfig,
    pub finalizer: FinalizerConfig,
    pub reaper: ReaperConfig,
    pub backoff: BackoffConfig,
    pub fast_path: FastPathConfig,
    pub protection: ProtectionConfig,
}

impl OrchestratorConfig {
    /// Validate every section, reporting the first one that fails
    pub fn validate(&self) -> ConfigResult<()> {
        section("queue_worker", self.queue_worker.validate())?;
        section("finalizer", self.finalizer.validate())?;
        section("reaper", self.reaper.validate())?;
        section("backoff", self.backoff.validate())?;
        section("fast_path", self.fast_path.validate())?;
        section("protection", self.protection.validate())?;
        Ok(())
    }
}

fn section(name: &str, result: OrchestratorResult<()>) -> ConfigResult<()> {
    result.map_err(|err| ConfigurationError::invalid_section(name, err))
}
