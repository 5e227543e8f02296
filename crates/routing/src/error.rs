//! Routing subsystem rejections.

use tradeflow_core::{ErrorCode, OrderId, WholesalerId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("routing not found")]
    NotFound,

    /// A routing round already exists for this order.
    #[error("order already has a routing round")]
    DuplicateRouting,

    /// The responder is not in the candidate set for this routing.
    #[error("wholesaler {wholesaler_id} is not a candidate")]
    NotACandidate { wholesaler_id: WholesalerId },

    /// No candidate accepted before the deadline; the order fails or is
    /// re-routed by the caller.
    #[error("routing exhausted for order {order_id}: no acceptance before deadline")]
    RoutingExhausted { order_id: OrderId },

    /// Scoring produced no eligible candidates to broadcast to.
    #[error("no eligible candidates for order {order_id}")]
    NoCandidates { order_id: OrderId },
}

impl ErrorCode for RoutingError {
    fn code(&self) -> &'static str {
        match self {
            RoutingError::NotFound => "ROUTING_NOT_FOUND",
            RoutingError::DuplicateRouting => "DUPLICATE_ROUTING",
            RoutingError::NotACandidate { .. } => "NOT_A_CANDIDATE",
            RoutingError::RoutingExhausted { .. } => "ROUTING_EXHAUSTED",
            RoutingError::NoCandidates { .. } => "NO_CANDIDATES",
        }
    }
}
