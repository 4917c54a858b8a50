//! # Execution Outcomes
//!
//! The closed set of results an executor can report for an operation. Runners
//! match on [`Outcome`] exhaustively; there is no open-ended "other" case.

use super::OpId;
use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of executing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// The operation succeeded
    Ok(Success),
    /// Transient failure; the operation may be attempted again
    Retry(Retry),
    /// Permanent failure
    Fail(Fail),
}

impl Outcome {
    /// Shorthand for a successful outcome without a message
    pub fn ok(op_id: OpId) -> Self {
        Self::Ok(Success::new(op_id))
    }

    /// Operation the outcome belongs to, when known
    pub fn op_id(&self) -> Option<&OpId> {
        match self {
            Self::Ok(success) => Some(success.op_id()),
            Self::Retry(retry) => Some(retry.op_id()),
            Self::Fail(fail) => fail.op_id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::Retry(_) => "retry",
            Self::Fail(_) => "fail",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(success) => write!(f, "ok({})", success.op_id()),
            Self::Retry(retry) => write!(
                f,
                "retry({}, attempt {})",
                retry.op_id(),
                retry.attempt_count()
            ),
            Self::Fail(fail) => write!(f, "fail({}: {})", fail.error_code(), fail.message()),
        }
    }
}

impl From<Success> for Outcome {
    fn from(success: Success) -> Self {
        Self::Ok(success)
    }
}

impl From<Retry> for Outcome {
    fn from(retry: Retry) -> Self {
        Self::Retry(retry)
    }
}

impl From<Fail> for Outcome {
    fn from(fail: Fail) -> Self {
        Self::Fail(fail)
    }
}

/// Successful completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success {
    op_id: OpId,
    message: Option<String>,
}

impl Success {
    pub fn new(op_id: OpId) -> Self {
        Self {
            op_id,
            message: None,
        }
    }

    pub fn with_message(op_id: OpId, message: impl Into<String>) -> Self {
        Self {
            op_id,
            message: Some(message.into()),
        }
    }

    pub fn op_id(&self) -> &OpId {
        &self.op_id
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Transient failure report. `attempt_count` counts attempts made so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retry {
    op_id: OpId,
    attempt_count: u32,
    reason: Option<String>,
}

impl Retry {
    pub fn new(
        op_id: OpId,
        attempt_count: u32,
        reason: Option<String>,
    ) -> OrchestratorResult<Self> {
        if attempt_count < 1 {
            return Err(OrchestratorError::validation(
                "attempt_count",
                "must be at least 1",
            ));
        }
        if let Some(reason) = &reason {
            if reason.trim().is_empty() {
                return Err(OrchestratorError::validation(
                    "reason",
                    "must not be blank when present",
                ));
            }
        }
        Ok(Self {
            op_id,
            attempt_count,
            reason,
        })
    }

    pub fn op_id(&self) -> &OpId {
        &self.op_id
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Permanent failure with a machine-readable code and a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fail {
    op_id: Option<OpId>,
    error_code: String,
    message: String,
    cause: Option<String>,
}

impl Fail {
    /// Build a failure with neither an operation id nor a cause
    pub fn of(
        error_code: impl Into<String>,
        message: impl Into<String>,
    ) -> OrchestratorResult<Self> {
        Self::new(error_code, message, None)
    }

    pub fn new(
        error_code: impl Into<String>,
        message: impl Into<String>,
        cause: Option<String>,
    ) -> OrchestratorResult<Self> {
        let error_code = error_code.into();
        let message = message.into();
        if error_code.trim().is_empty() {
            return Err(OrchestratorError::validation("error_code", "must not be blank"));
        }
        if message.trim().is_empty() {
            return Err(OrchestratorError::validation("message", "must not be blank"));
        }
        Ok(Self {
            op_id: None,
            error_code,
            message,
            cause,
        })
    }

    /// Attach the operation this failure belongs to
    pub fn for_op(mut self, op_id: OpId) -> Self {
        self.op_id = Some(op_id);
        self
    }

    pub fn op_id(&self) -> Option<&OpId> {
        self.op_id.as_ref()
    }

    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op() -> OpId {
        OpId::new("op-1").unwrap()
    }

    #[test]
    fn test_fail_of_has_no_cause() {
        let fail = Fail::of("ORDER-001", "Order not found").unwrap();
        assert_eq!(fail.error_code(), "ORDER-001");
        assert_eq!(fail.message(), "Order not found");
        assert!(fail.cause().is_none());
        assert!(fail.op_id().is_none());
    }

    #[test]
    fn test_fail_rejects_blank_fields() {
        assert!(Fail::of("", "Order not found").is_err());
        assert!(Fail::of("  ", "Order not found").is_err());
        assert!(Fail::of("ORDER-001", "").is_err());
    }

    #[test]
    fn test_fail_for_op_attaches_id() {
        let fail = Fail::of("E1", "boom").unwrap().for_op(op());
        assert_eq!(fail.op_id(), Some(&op()));
        assert_eq!(Outcome::Fail(fail).op_id(), Some(&op()));
    }

    #[test]
    fn test_retry_validation() {
        assert!(Retry::new(op(), 0, None).is_err());
        assert!(Retry::new(op(), 1, Some("  ".to_string())).is_err());
        let retry = Retry::new(op(), 2, Some("downstream busy".to_string())).unwrap();
        assert_eq!(retry.attempt_count(), 2);
        assert_eq!(retry.reason(), Some("downstream busy"));
    }

    #[test]
    fn test_tagged_serialization() {
        let outcome = Outcome::ok(op());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["type"], "ok");
        assert_eq!(json["op_id"], "op-1");

        let outcome: Outcome = Fail::of("E1", "boom").unwrap().into();
        let json = serde_json::to_string(&outcome).unwrap();
        let decoded: Outcome = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, outcome);
        assert_eq!(decoded.kind(), "fail");
    }
}
