//! # Orchestrator Error Types
//!
//! Structured error handling for the orchestrator using thiserror. Every
//! fallible operation in the crate returns [`OrchestratorResult`].

use crate::models::OpId;
use crate::state_machine::OperationState;
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Illegal state transition: {from} -> {to}")]
    IllegalTransition {
        from: OperationState,
        to: OperationState,
    },

    #[error("Operation {op_id} already finalized in state {state}")]
    AlreadyFinalized {
        op_id: OpId,
        state: OperationState,
    },

    #[error("{entity} not found for operation {op_id}")]
    NotFound { entity: String, op_id: OpId },

    #[error("Operation {op_id} did not reach a terminal state within {timeout_ms}ms")]
    ProcessingTimeout { op_id: OpId, timeout_ms: u64 },

    #[error("Executor error: {operation}: {message}")]
    Executor { operation: String, message: String },

    #[error("Store error: {operation}: {message}")]
    Store { operation: String, message: String },

    #[error("Messaging error: {operation}: {message}")]
    Messaging { operation: String, message: String },

    #[error("Circuit breaker is open for component: {component}")]
    CircuitOpen { component: String },

    #[error("Bulkhead full: {max_concurrent_calls} concurrent calls in flight")]
    BulkheadFull { max_concurrent_calls: usize },

    #[error("Rate limit exceeded: {permits_per_second} permits per second")]
    RateLimited { permits_per_second: u32 },

    #[error("Attempt timed out after {timeout_ms}ms")]
    AttemptTimeout { timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl OrchestratorError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error for the given entity kind
    pub fn not_found(entity: impl Into<String>, op_id: &OpId) -> Self {
        Self::NotFound {
            entity: entity.into(),
            op_id: op_id.clone(),
        }
    }

    /// Create an executor error
    pub fn executor(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Executor {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a messaging error
    pub fn messaging(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Messaging {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a protection hook rejected the call before it reached the executor
    pub fn is_protection_rejection(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. } | Self::BulkheadFull { .. } | Self::RateLimited { .. }
        )
    }

    /// Whether this error reports an illegal or repeated finalization
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            Self::IllegalTransition { .. } | Self::AlreadyFinalized { .. }
        )
    }
}

impl From<crate::config::ConfigurationError> for OrchestratorError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
