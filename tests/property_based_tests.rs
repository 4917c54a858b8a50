mod common;

use common::strategies::*;
use orchestrator_core::models::{Domain, OpId};
use orchestrator_core::orchestration::BackoffCalculator;
use orchestrator_core::state_machine::{OperationState, StateTransition};
use orchestrator_core::store::{InMemoryStore, Store};
use proptest::prelude::*;

proptest! {
    /// Property: every delay stays within [0, max]
    #[test]
    fn backoff_delay_is_bounded(
        (base, max, jitter) in backoff_params_strategy(),
        attempt in 1u32..200,
    ) {
        let calculator = BackoffCalculator::new(base, max, jitter).unwrap();
        let delay = calculator.calculate(attempt).unwrap();
        prop_assert!(delay <= max);
    }

    /// Property: the jitter-free component never decreases with the attempt number
    #[test]
    fn backoff_exponential_component_is_monotonic(
        (base, max, jitter) in backoff_params_strategy(),
        attempt in 1u32..199,
    ) {
        let calculator = BackoffCalculator::new(base, max, jitter).unwrap();
        let current = calculator.exponential_delay_ms(attempt).unwrap();
        let next = calculator.exponential_delay_ms(attempt + 1).unwrap();
        prop_assert!(current <= next);
        prop_assert!(current >= base.min(max));
    }

    /// Property: jitter never pushes a delay below its exponential component
    #[test]
    fn backoff_jitter_only_adds(
        (base, max, jitter) in backoff_params_strategy(),
        attempt in 1u32..64,
    ) {
        let calculator = BackoffCalculator::new(base, max, jitter).unwrap();
        let exponential = calculator.exponential_delay_ms(attempt).unwrap();
        let delay = calculator.calculate(attempt).unwrap();
        prop_assert!(delay >= exponential);
        prop_assert!(delay as f64 <= exponential as f64 * (1.0 + jitter) + 1.0);
    }

    /// Property: nothing leaves a terminal state, not even a self-transition
    #[test]
    fn terminal_states_are_immutable(
        from in terminal_state_strategy(),
        to in operation_state_strategy(),
    ) {
        prop_assert!(!StateTransition::is_allowed(from, to));
        prop_assert!(StateTransition::validate(from, to).is_err());
    }

    /// Property: a legal transition never ends in Pending
    #[test]
    fn transitions_never_return_to_pending(from in operation_state_strategy()) {
        prop_assert!(!StateTransition::is_allowed(from, OperationState::Pending));
    }

    /// Property: transition returns the target exactly when validate passes
    #[test]
    fn transition_agrees_with_validate(
        from in operation_state_strategy(),
        to in operation_state_strategy(),
    ) {
        match StateTransition::transition(from, to) {
            Ok(state) => {
                prop_assert_eq!(state, to);
                prop_assert!(StateTransition::validate(from, to).is_ok());
            }
            Err(_) => prop_assert!(StateTransition::validate(from, to).is_err()),
        }
    }

    /// Property: well-formed identifiers are accepted and round-trip through Display
    #[test]
    fn valid_op_ids_are_accepted(value in op_id_strategy()) {
        let op_id = OpId::new(value.clone()).unwrap();
        prop_assert_eq!(op_id.to_string(), value);
    }

    /// Property: identifiers with a disallowed character are rejected
    #[test]
    fn op_ids_with_illegal_characters_are_rejected(
        prefix in "[a-z]{0,10}",
        bad in "[ !@#$%^&*./:]",
    ) {
        let value = format!("{prefix}{bad}");
        prop_assert!(OpId::new(value).is_err());
    }

    /// Property: uppercase names within the length limit are valid domains
    #[test]
    fn domain_names_are_accepted(name in domain_name_strategy()) {
        prop_assert!(Domain::new(name).is_ok());
    }

    /// Property: exactly one finalize wins no matter how many callers race
    #[test]
    fn finalize_is_exactly_once(callers in 2usize..16, target in terminal_state_strategy()) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let successes = runtime.block_on(async move {
            let store = std::sync::Arc::new(InMemoryStore::new());
            let op_id = OpId::new("op-race").unwrap();
            store.mark_in_progress(&op_id).unwrap();

            let mut handles = Vec::new();
            for _ in 0..callers {
                let store = store.clone();
                let op_id = op_id.clone();
                handles.push(tokio::spawn(async move {
                    store.finalize(&op_id, target).await.is_ok()
                }));
            }

            let mut successes = 0;
            for handle in handles {
                if handle.await.unwrap() {
                    successes += 1;
                }
            }
            successes
        });

        prop_assert_eq!(successes, 1);
    }
}
