//! Result of a fast-path submission.

use crate::models::{OpId, Outcome};
use serde::{Deserialize, Serialize};

/// What the caller gets back from [`Orchestrator::submit`](super::Orchestrator::submit).
///
/// `Completed` carries the outcome when the executor finished inside the time
/// budget. `Async` hands the caller a status URL to poll instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationHandle {
    Completed { op_id: OpId, outcome: Outcome },
    Async { op_id: OpId, status_url: String },
}

impl OperationHandle {
    pub fn completed(op_id: OpId, outcome: Outcome) -> Self {
        Self::Completed { op_id, outcome }
    }

    /// Async handle with the status URL derived from `status_url_base`
    pub fn pending(op_id: OpId, status_url_base: &str) -> Self {
        let status_url = format!(
            "{}/{}/status",
            status_url_base.trim_end_matches('/'),
            op_id
        );
        Self::Async { op_id, status_url }
    }

    pub fn op_id(&self) -> &OpId {
        match self {
            Self::Completed { op_id, .. } | Self::Async { op_id, .. } => op_id,
        }
    }

    pub fn is_completed_fast(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Completed { outcome, .. } => Some(outcome),
            Self::Async { .. } => None,
        }
    }

    pub fn status_url(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Async { status_url, .. } => Some(status_url),
        }
    }
}
