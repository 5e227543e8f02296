//! Actor identity recorded on audit rows.

use serde::{Deserialize, Serialize};

use crate::id::{RetailerId, WholesalerId};

/// Who caused a state change. Recorded on every transition log row so the
/// audit trail distinguishes operator and vendor actions from housekeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    /// Internal orchestration (validation, credit, fulfillment plumbing).
    System,
    /// A retailer-originated action (placement, cancellation).
    Retailer { id: RetailerId },
    /// A wholesaler-originated action (accept, reject).
    Wholesaler { id: WholesalerId },
    /// The background timeout sweeper.
    Sweeper,
}

impl core::fmt::Display for Actor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Actor::System => write!(f, "system"),
            Actor::Retailer { id } => write!(f, "retailer:{id}"),
            Actor::Wholesaler { id } => write!(f, "wholesaler:{id}"),
            Actor::Sweeper => write!(f, "sweeper"),
        }
    }
}
