use super::{Command, OpId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An accepted operation: its identifier, the command and the acceptance time.
///
/// Created exactly once per accepted operation and republished unchanged on
/// retry or redelivery. `accepted_at` is never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub op_id: OpId,
    pub command: Command,
    pub accepted_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(op_id: OpId, command: Command, accepted_at: DateTime<Utc>) -> Self {
        Self {
            op_id,
            command,
            accepted_at,
        }
    }

    /// Build an envelope accepted at the current instant
    pub fn now(op_id: OpId, command: Command) -> Self {
        Self::new(op_id, command, Utc::now())
    }
}
