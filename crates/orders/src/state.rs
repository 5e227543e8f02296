//! The order state machine table (pure).
//!
//! The set of legal transitions is static and enumerable, so "impossible"
//! transitions can be asserted in tests rather than discovered in
//! production. The service layer in `tradeflow-infra` is the only writer of
//! `Order::state`; everything here is decision logic with no IO.

use serde::{Deserialize, Serialize};
use tradeflow_core::ErrorCode;

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Created,
    Validated,
    CreditReserved,
    VendorNotified,
    VendorAccepted,
    VendorRejected,
    Fulfilled,
    Cancelled,
    Failed,
}

impl OrderState {
    /// Terminal states permit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Fulfilled | OrderState::Cancelled | OrderState::Failed
        )
    }

    /// Targets legal from this state. Empty for terminal states.
    pub fn allowed_transitions(self) -> &'static [OrderState] {
        use OrderState::*;
        match self {
            Created => &[Validated, Cancelled, Failed],
            Validated => &[CreditReserved, Cancelled, Failed],
            CreditReserved => &[VendorNotified, Cancelled, Failed],
            VendorNotified => &[VendorAccepted, VendorRejected, Cancelled, Failed],
            VendorAccepted => &[Fulfilled, Cancelled, Failed],
            VendorRejected => &[Cancelled, Failed],
            Fulfilled | Cancelled | Failed => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderState) -> bool {
        self.allowed_transitions().contains(&target)
    }
}

impl core::fmt::Display for OrderState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OrderState::Created => "CREATED",
            OrderState::Validated => "VALIDATED",
            OrderState::CreditReserved => "CREDIT_RESERVED",
            OrderState::VendorNotified => "VENDOR_NOTIFIED",
            OrderState::VendorAccepted => "VENDOR_ACCEPTED",
            OrderState::VendorRejected => "VENDOR_REJECTED",
            OrderState::Fulfilled => "FULFILLED",
            OrderState::Cancelled => "CANCELLED",
            OrderState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Rejection raised when a transition request is illegal. Nothing is mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderState, to: OrderState },

    #[error("order is in terminal state {state}; no transitions permitted")]
    TerminalState { state: OrderState },

    #[error("order not found")]
    NotFound,
}

impl ErrorCode for TransitionError {
    fn code(&self) -> &'static str {
        match self {
            TransitionError::InvalidTransition { .. } => "INVALID_TRANSITION",
            TransitionError::TerminalState { .. } => "TERMINAL_STATE",
            TransitionError::NotFound => "ORDER_NOT_FOUND",
        }
    }
}

/// Validate a requested transition against the table.
///
/// Terminal-state violations take precedence over the transition check so
/// callers get the more specific rejection.
pub fn check_transition(current: OrderState, target: OrderState) -> Result<(), TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::TerminalState { state: current });
    }
    if !current.can_transition_to(target) {
        return Err(TransitionError::InvalidTransition {
            from: current,
            to: target,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_STATES: [OrderState; 9] = [
        OrderState::Created,
        OrderState::Validated,
        OrderState::CreditReserved,
        OrderState::VendorNotified,
        OrderState::VendorAccepted,
        OrderState::VendorRejected,
        OrderState::Fulfilled,
        OrderState::Cancelled,
        OrderState::Failed,
    ];

    #[test]
    fn happy_path_is_legal() {
        let path = [
            OrderState::Created,
            OrderState::Validated,
            OrderState::CreditReserved,
            OrderState::VendorNotified,
            OrderState::VendorAccepted,
            OrderState::Fulfilled,
        ];
        for pair in path.windows(2) {
            check_transition(pair[0], pair[1]).unwrap();
        }
    }

    #[test]
    fn direct_jump_to_fulfilled_is_rejected() {
        let err = check_transition(OrderState::Created, OrderState::Fulfilled).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: OrderState::Created,
                to: OrderState::Fulfilled,
            }
        );
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for state in ALL_STATES.iter().filter(|s| s.is_terminal()) {
            assert!(state.allowed_transitions().is_empty());
            for target in ALL_STATES {
                let err = check_transition(*state, target).unwrap_err();
                assert_eq!(err, TransitionError::TerminalState { state: *state });
            }
        }
    }

    #[test]
    fn cancel_and_fail_reachable_from_every_non_terminal_state() {
        for state in ALL_STATES.iter().filter(|s| !s.is_terminal()) {
            assert!(state.can_transition_to(OrderState::Cancelled), "{state}");
            assert!(state.can_transition_to(OrderState::Failed), "{state}");
        }
    }

    #[test]
    fn rejected_orders_cannot_be_revived() {
        assert!(!OrderState::VendorRejected.can_transition_to(OrderState::VendorNotified));
        assert!(!OrderState::VendorRejected.can_transition_to(OrderState::VendorAccepted));
        assert!(!OrderState::VendorRejected.can_transition_to(OrderState::Fulfilled));
    }

    fn arb_state() -> impl Strategy<Value = OrderState> {
        prop::sample::select(ALL_STATES.to_vec())
    }

    proptest! {
        /// Any walk built by repeatedly picking from `allowed_transitions`
        /// validates step by step, ends the moment a terminal state is
        /// reached, and never regresses to an earlier decision point.
        #[test]
        fn random_walks_over_the_table_are_valid(seed in any::<u64>(), steps in 1usize..16) {
            let mut state = OrderState::Created;
            let mut rng = seed;
            for _ in 0..steps {
                let allowed = state.allowed_transitions();
                if allowed.is_empty() {
                    prop_assert!(state.is_terminal());
                    break;
                }
                // Cheap deterministic index selection from the seed.
                rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let next = allowed[(rng >> 33) as usize % allowed.len()];
                prop_assert!(check_transition(state, next).is_ok());
                state = next;
            }
        }

        /// check_transition agrees with the static table for every pair.
        #[test]
        fn check_matches_table(from in arb_state(), to in arb_state()) {
            let result = check_transition(from, to);
            if from.is_terminal() {
                prop_assert_eq!(result, Err(TransitionError::TerminalState { state: from }));
            } else if from.can_transition_to(to) {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(
                    result,
                    Err(TransitionError::InvalidTransition { from, to })
                );
            }
        }
    }
}
