//! Proptest strategies shared by the property-based suites.

#![allow(dead_code)]

use orchestrator_core::state_machine::OperationState;
use proptest::prelude::*;

/// Strategy for any operation state
pub fn operation_state_strategy() -> impl Strategy<Value = OperationState> {
    prop_oneof![
        Just(OperationState::Pending),
        Just(OperationState::InProgress),
        Just(OperationState::Completed),
        Just(OperationState::Failed),
    ]
}

/// Strategy for terminal states only
pub fn terminal_state_strategy() -> impl Strategy<Value = OperationState> {
    prop_oneof![Just(OperationState::Completed), Just(OperationState::Failed)]
}

/// Strategy for valid backoff parameters `(base, max, jitter)`
pub fn backoff_params_strategy() -> impl Strategy<Value = (u64, u64, f64)> {
    (1u64..10_000, 0u64..1_000_000, 0.0f64..=1.0)
        .prop_map(|(base, extra, jitter)| (base, base + extra, jitter))
}

/// Strategy for valid operation identifiers
pub fn op_id_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,255}"
}

/// Strategy for valid domain and event type names
pub fn domain_name_strategy() -> impl Strategy<Value = String> {
    "[A-Z_]{1,50}"
}
