//! # Model Layer
//!
//! Immutable value objects shared by every runner: identifiers, commands,
//! envelopes and execution outcomes. Constructors validate eagerly.

pub mod command;
pub mod envelope;
pub mod idempotency_key;
pub mod op_id;
pub mod outcome;

pub use command::{BizKey, Command, Domain, EventType, IdemKey, Payload};
pub use envelope::Envelope;
pub use idempotency_key::IdempotencyKey;
pub use op_id::OpId;
pub use outcome::{Fail, Outcome, Retry, Success};
