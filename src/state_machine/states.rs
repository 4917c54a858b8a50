use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an accepted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Accepted but not yet started
    Pending,
    /// Dispatched to an executor
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished with a permanent failure
    Failed,
}

impl OperationState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if this is an active state (operation is being processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid operation state: {s}")),
        }
    }
}

/// Default state for newly accepted operations
impl Default for OperationState {
    fn default() -> Self {
        Self::Pending
    }
}

/// State of a write-ahead log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAheadState {
    /// Outcome recorded, matching finalize not yet applied
    Pending,
    /// Matching finalize applied; the row is read-only
    Completed,
}

impl fmt::Display for WriteAheadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for WriteAheadState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid write-ahead state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_state_terminal_check() {
        assert!(!OperationState::Pending.is_terminal());
        assert!(!OperationState::InProgress.is_terminal());
        assert!(OperationState::Completed.is_terminal());
        assert!(OperationState::Failed.is_terminal());
    }

    #[test]
    fn test_operation_state_active_check() {
        assert!(OperationState::InProgress.is_active());
        assert!(!OperationState::Pending.is_active());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(OperationState::InProgress.to_string(), "in_progress");
        assert_eq!(
            "completed".parse::<OperationState>().unwrap(),
            OperationState::Completed
        );
        assert!("done".parse::<OperationState>().is_err());
        assert_eq!(
            "pending".parse::<WriteAheadState>().unwrap(),
            WriteAheadState::Pending
        );
    }

    #[test]
    fn test_default_state() {
        assert_eq!(OperationState::default(), OperationState::Pending);
    }
}
