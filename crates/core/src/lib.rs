//! Shared kernel for the tradeflow order orchestration core.
//!
//! Strongly-typed identifiers, actor identity for audit rows, the bounded
//! retry policy used against contended rows, and the stable error-code
//! contract. No IO, no storage assumptions.

pub mod actor;
pub mod error;
pub mod id;
pub mod retry;

pub use actor::Actor;
pub use error::ErrorCode;
pub use id::{
    InvalidId, LedgerEntryId, OrderId, ProductId, ReservationId, RetailerId, RoutingId,
    WholesalerId,
};
pub use retry::{RetryOutcome, RetryPolicy};
