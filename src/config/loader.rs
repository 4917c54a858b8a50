//! Configuration Loader
//!
//! Layers an optional configuration file (TOML, YAML or JSON, chosen by
//! extension) under environment overrides and validates the result.
//!
//! Environment overrides use the `ORCHESTRATOR` prefix and `__` as the
//! nesting separator:
//!
//! ```text
//! ORCHESTRATOR__QUEUE_WORKER__BATCH_SIZE=20
//! ORCHESTRATOR__REAPER__DEFAULT_STRATEGY=retry
//! ```

use super::error::{ConfigResult, ConfigurationError};
use super::OrchestratorConfig;
use ::config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "ORCHESTRATOR";
/// Separator between prefix and nested keys
pub const ENV_SEPARATOR: &str = "__";
/// Environment variable naming a configuration file for [`ConfigManager::load`]
pub const CONFIG_PATH_ENV: &str = "ORCHESTRATOR_CONFIG_PATH";

/// Loaded and validated configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: OrchestratorConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load from `ORCHESTRATOR_CONFIG_PATH` (if set) plus process environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::build(path.as_deref(), None)
    }

    /// Load from a specific file plus process environment
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(Some(path.as_ref()), None)
    }

    /// Load with an explicit override map in place of the process environment.
    ///
    /// Keys follow the environment format (`ORCHESTRATOR__SECTION__FIELD`).
    /// This is useful for testing without modifying global environment variables.
    pub fn load_with_overrides(
        path: Option<&Path>,
        overrides: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(path, Some(overrides))
    }

    fn build(
        path: Option<&Path>,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigurationError::config_file_not_found(path));
            }
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path.to_path_buf()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(overrides),
        );

        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment".to_string());
        let merged = builder
            .build()
            .map_err(|e| ConfigurationError::load_error(&source_name, e))?;
        let config: OrchestratorConfig = merged
            .try_deserialize()
            .map_err(ConfigurationError::deserialization_error)?;

        config.validate()?;

        info!(
            environment = %environment,
            source = %source_name,
            "⚙️ CONFIG: Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_path: path.map(Path::to_path_buf),
        }))
    }

    /// Detect the current environment from `ORCHESTRATOR_ENV` or `APP_ENV`
    pub fn detect_environment() -> String {
        env::var("ORCHESTRATOR_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Effective configuration as JSON, for diagnostics
    pub fn debug_config(&self) -> ConfigResult<serde_json::Value> {
        serde_json::to_value(&self.config)
            .map_err(|e| ConfigurationError::json_serialization_error("debug_config", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::ReconcileStrategy;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let manager = ConfigManager::load_with_overrides(None, HashMap::new()).unwrap();
        assert_eq!(manager.config(), &OrchestratorConfig::default());
        assert!(manager.source_path().is_none());
    }

    #[test]
    fn test_load_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "orchestrator.toml",
            r#"
[queue_worker]
batch_size = 25
concurrency = 4

[reaper]
default_strategy = "retry"
timeout_threshold_ms = 120000

[protection.circuit_breaker]
failure_threshold = 3
"#,
        );

        let manager = ConfigManager::load_with_overrides(Some(&path), HashMap::new()).unwrap();
        let config = manager.config();

        assert_eq!(config.queue_worker.batch_size(), 25);
        assert_eq!(config.queue_worker.concurrency(), 4);
        assert_eq!(config.queue_worker.max_retries(), 3);
        assert_eq!(config.reaper.default_strategy(), ReconcileStrategy::Retry);
        assert_eq!(config.reaper.timeout_threshold_ms(), 120_000);
        let breaker = config.protection.circuit_breaker.as_ref().unwrap();
        assert_eq!(breaker.failure_threshold, 3);
        assert_eq!(manager.source_path(), Some(path.as_path()));
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "orchestrator.yaml",
            "finalizer:\n  scan_interval_ms: 5000\nbackoff:\n  base_delay_ms: 250\n",
        );

        let manager = ConfigManager::load_with_overrides(Some(&path), HashMap::new()).unwrap();
        assert_eq!(manager.config().finalizer.scan_interval_ms(), 5_000);
        assert_eq!(manager.config().backoff.base_delay_ms, 250);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "orchestrator.toml", "[queue_worker]\nbatch_size = 25\n");

        let overrides = HashMap::from([
            ("ORCHESTRATOR__QUEUE_WORKER__BATCH_SIZE".to_string(), "40".to_string()),
            ("ORCHESTRATOR__QUEUE_WORKER__DLQ_ENABLED".to_string(), "false".to_string()),
        ]);
        let manager = ConfigManager::load_with_overrides(Some(&path), overrides).unwrap();

        assert_eq!(manager.config().queue_worker.batch_size(), 40);
        assert!(!manager.config().queue_worker.dlq_enabled());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = ConfigManager::load_from_file("/definitely/not/here/orchestrator.toml");
        assert!(matches!(
            result,
            Err(ConfigurationError::ConfigFileNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "orchestrator.toml", "[fast_path]\ndefault_time_budget_ms = 10\n");

        let result = ConfigManager::load_with_overrides(Some(&path), HashMap::new());
        match result {
            Err(ConfigurationError::InvalidSection { section, .. }) => {
                assert_eq!(section, "fast_path")
            }
            other => panic!("expected fast_path validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_config_serializes_sections() {
        let manager = ConfigManager::load_with_overrides(None, HashMap::new()).unwrap();
        let json = manager.debug_config().unwrap();
        assert_eq!(json["queue_worker"]["batch_size"], 10);
        assert_eq!(json["reaper"]["default_strategy"], "fail");
    }
}
