//! Command value objects.
//!
//! A [`Command`] is the unit of work submitted to the orchestrator. Each
//! component is a validated newtype so an invalid command cannot be built.

use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DOMAIN_MAX_LENGTH: usize = 50;
pub const EVENT_TYPE_MAX_LENGTH: usize = 50;
pub const BIZ_KEY_MAX_LENGTH: usize = 100;
pub const IDEM_KEY_MAX_LENGTH: usize = 255;

fn require_text(field: &str, value: &str, max_len: usize) -> OrchestratorResult<()> {
    if value.trim().is_empty() {
        return Err(OrchestratorError::validation(field, "must not be blank"));
    }
    if value.chars().count() > max_len {
        return Err(OrchestratorError::validation(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
    Ok(())
}

fn require_upper_snake(field: &str, value: &str) -> OrchestratorResult<()> {
    if !value.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
        return Err(OrchestratorError::validation(
            field,
            "may only contain uppercase letters and '_'",
        ));
    }
    Ok(())
}

/// Business domain, e.g. `ORDERS`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    pub fn new(value: impl Into<String>) -> OrchestratorResult<Self> {
        let value = value.into();
        require_text("domain", &value, DOMAIN_MAX_LENGTH)?;
        require_upper_snake("domain", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Event type within a domain, e.g. `ORDER_PLACED`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventType(String);

impl EventType {
    pub fn new(value: impl Into<String>) -> OrchestratorResult<Self> {
        let value = value.into();
        require_text("event_type", &value, EVENT_TYPE_MAX_LENGTH)?;
        require_upper_snake("event_type", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Business entity key the command acts on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BizKey(String);

impl BizKey {
    pub fn new(value: impl Into<String>) -> OrchestratorResult<Self> {
        let value = value.into();
        require_text("biz_key", &value, BIZ_KEY_MAX_LENGTH)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Caller-supplied idempotency token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdemKey(String);

impl IdemKey {
    pub fn new(value: impl Into<String>) -> OrchestratorResult<Self> {
        let value = value.into();
        require_text("idem_key", &value, IDEM_KEY_MAX_LENGTH)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque serialized command body. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

macro_rules! string_newtype_conversions {
    ($($ty:ident),+) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = OrchestratorError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    Self::new(value)
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.0
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )+
    };
}

string_newtype_conversions!(Domain, EventType, BizKey, IdemKey);

/// Unit of work submitted to the orchestrator. Immutable; equality by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    pub domain: Domain,
    pub event_type: EventType,
    pub biz_key: BizKey,
    pub idem_key: IdemKey,
    pub payload: Payload,
}

impl Command {
    pub fn new(
        domain: Domain,
        event_type: EventType,
        biz_key: BizKey,
        idem_key: IdemKey,
        payload: Payload,
    ) -> Self {
        Self {
            domain,
            event_type,
            biz_key,
            idem_key,
            payload,
        }
    }

    /// Build a command from raw strings, validating every component
    pub fn parse(
        domain: &str,
        event_type: &str,
        biz_key: &str,
        idem_key: &str,
        payload: &str,
    ) -> OrchestratorResult<Self> {
        Ok(Self::new(
            Domain::new(domain)?,
            EventType::new(event_type)?,
            BizKey::new(biz_key)?,
            IdemKey::new(idem_key)?,
            Payload::new(payload),
        ))
    }
}
