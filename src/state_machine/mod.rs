//! # Operation State Machine
//!
//! Operation lifecycle states, write-ahead log row states and the transition
//! validator every finalization goes through.

pub mod states;
pub mod transitions;

pub use states::{OperationState, WriteAheadState};
pub use transitions::StateTransition;
