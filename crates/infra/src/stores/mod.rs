//! Storage contracts and their in-memory implementations.
//!
//! Each store method is one transaction: the atomic check-then-write happens
//! inside the store, under its own locking, so callers never hold a
//! check-then-set window. In-memory implementations are intended for
//! tests/dev; a relational backend would implement the same traits.

pub mod credit;
pub mod orders;
pub mod routing;

pub use credit::{CreditStore, CreditStoreError, InMemoryCreditStore};
pub use orders::{InMemoryOrderStore, OrderStore, OrderStoreError};
pub use routing::{InMemoryRoutingStore, LockOutcome, RoutingStore, RoutingStoreError};
