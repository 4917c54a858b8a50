//! Configuration Error Types
//!
//! Errors raised while loading, merging and validating orchestrator
//! configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Explicitly requested configuration file does not exist
    #[error("Configuration file not found: {path}")]
    ConfigFileNotFound { path: PathBuf },

    /// File or environment source could not be read or merged
    #[error("Failed to load configuration from {source_name}: {error}")]
    LoadError { source_name: String, error: String },

    /// Merged configuration does not match the expected shape
    #[error("Failed to deserialize configuration: {error}")]
    DeserializationError { error: String },

    /// A section failed its value-object validation
    #[error("Invalid configuration in section '{section}': {error}")]
    InvalidSection { section: String, error: String },

    /// JSON serialization errors
    #[error("JSON serialization error in {context}: {error}")]
    JsonSerializationError { context: String, error: String },
}

impl ConfigurationError {
    /// Create a configuration file not found error
    pub fn config_file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigFileNotFound { path: path.into() }
    }

    /// Create a load error for a named source
    pub fn load_error<S: Into<String>, E: std::fmt::Display>(source_name: S, error: E) -> Self {
        Self::LoadError {
            source_name: source_name.into(),
            error: error.to_string(),
        }
    }

    /// Create a deserialization error
    pub fn deserialization_error<E: std::fmt::Display>(error: E) -> Self {
        Self::DeserializationError {
            error: error.to_string(),
        }
    }

    /// Create an invalid section error
    pub fn invalid_section<S: Into<String>, E: std::fmt::Display>(section: S, error: E) -> Self {
        Self::InvalidSection {
            section: section.into(),
            error: error.to_string(),
        }
    }

    /// Create a JSON serialization error
    pub fn json_serialization_error<C: Into<String>, E: std::fmt::Display>(
        context: C,
        error: E,
    ) -> Self {
        Self::JsonSerializationError {
            context: context.into(),
            error: error.to_string(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err =
            ConfigurationError::invalid_section("queue_worker", "batch_size: must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration in section 'queue_worker': batch_size: must be positive"
        );

        let err = ConfigurationError::config_file_not_found("/etc/orchestrator.toml");
        assert!(err.to_string().contains("/etc/orchestrator.toml"));
    }
}
