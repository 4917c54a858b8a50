//! Single authority on which operation state changes are legal.

use super::OperationState;
use crate::error::{OrchestratorError, OrchestratorResult};

/// Validator for [`OperationState`] transitions.
///
/// Legal transitions:
///
/// | from          | to                                   |
/// |---------------|--------------------------------------|
/// | `Pending`     | `InProgress`                         |
/// | `InProgress`  | `InProgress`, `Completed`, `Failed`  |
///
/// Nothing leaves a terminal state, not even a self-transition.
pub struct StateTransition;

impl StateTransition {
    /// Whether `from -> to` is a legal transition
    pub fn is_allowed(from: OperationState, to: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (from, to),
            (Pending, InProgress)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }

    pub fn validate(from: OperationState, to: OperationState) -> OrchestratorResult<()> {
        if Self::is_allowed(from, to) {
            Ok(())
        } else {
            Err(OrchestratorError::IllegalTransition { from, to })
        }
    }

    /// Validate and return the target state
    pub fn transition(
        from: OperationState,
        to: OperationState,
    ) -> OrchestratorResult<OperationState> {
        Self::validate(from, to)?;
        Ok(to)
    }
}
