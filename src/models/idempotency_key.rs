use super::command::{BizKey, Command, Domain, EventType, IdemKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite deduplication key `(domain, event_type, biz_key, idem_key)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub domain: Domain,
    pub event_type: EventType,
    pub biz_key: BizKey,
    pub idem_key: IdemKey,
}

impl IdempotencyKey {
    pub fn new(domain: Domain, event_type: EventType, biz_key: BizKey, idem_key: IdemKey) -> Self {
        Self {
            domain,
            event_type,
            biz_key,
            idem_key,
        }
    }
}

impl From<&Command> for IdempotencyKey {
    fn from(command: &Command) -> Self {
        Self::new(
            command.domain.clone(),
            command.event_type.clone(),
            command.biz_key.clone(),
            command.idem_key.clone(),
        )
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.domain, self.event_type, self.biz_key, self.idem_key
        )
    }
}
