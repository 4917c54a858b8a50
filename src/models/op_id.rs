use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an operation identifier
pub const OP_ID_MAX_LENGTH: usize = 255;

/// Opaque, globally unique identifier of an accepted operation.
///
/// Primary key across the store and the bus. Restricted to ASCII letters,
/// digits, `-` and `_` so it can be embedded in status URLs verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OpId(String);

impl OpId {
    pub fn new(value: impl Into<String>) -> OrchestratorResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(OrchestratorError::validation("op_id", "must not be blank"));
        }
        if value.len() > OP_ID_MAX_LENGTH {
            return Err(OrchestratorError::validation(
                "op_id",
                format!("must be at most {OP_ID_MAX_LENGTH} characters"),
            ));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(OrchestratorError::validation(
                "op_id",
                "may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(value))
    }

    /// Generate a fresh random identifier (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OpId {
    type Error = OrchestratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OpId> for String {
    fn from(op_id: OpId) -> Self {
        op_id.0
    }
}

impl std::str::FromStr for OpId {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
