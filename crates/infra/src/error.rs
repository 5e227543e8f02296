//! Orchestration-level error type.
//!
//! The service layer composes the subsystem rejections into one enum so
//! callers (HTTP handlers, chat transports) match on a single type. Every
//! variant keeps its stable code and numeric context.

use tradeflow_core::ErrorCode;
use tradeflow_credit::CreditError;
use tradeflow_orders::{OrderBuildError, TransitionError};
use tradeflow_routing::RoutingError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Credit(#[from] CreditError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Build(#[from] OrderBuildError),

    /// The external validation predicate rejected the order.
    #[error("order validation failed: {reason}")]
    ValidationFailed { reason: String },

    /// Storage-level failure (duplicate insert, poisoned lock).
    #[error("storage error: {0}")]
    Store(String),
}

impl ErrorCode for OrchestrationError {
    fn code(&self) -> &'static str {
        match self {
            OrchestrationError::Transition(e) => e.code(),
            OrchestrationError::Credit(e) => e.code(),
            OrchestrationError::Routing(e) => e.code(),
            OrchestrationError::Build(_) => "INVALID_ORDER",
            OrchestrationError::ValidationFailed { .. } => "VALIDATION_FAILED",
            OrchestrationError::Store(_) => "STORE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeflow_orders::OrderState;

    #[test]
    fn codes_pass_through_from_subsystems() {
        let err = OrchestrationError::from(TransitionError::TerminalState {
            state: OrderState::Fulfilled,
        });
        assert_eq!(err.code(), "TERMINAL_STATE");

        let err = OrchestrationError::from(CreditError::InsufficientCredit {
            requested: 40_000,
            available: 10_000,
        });
        assert_eq!(err.code(), "INSUFFICIENT_CREDIT");
    }
}
