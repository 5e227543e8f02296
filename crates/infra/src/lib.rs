//! Orchestration layer: stores, the credit engine, the routing coordinator,
//! the order state machine service, and the background sweeper, wired over
//! the domain crates.

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod ports;
pub mod selector;
pub mod state_machine;
pub mod stores;
pub mod sweeper;

pub use coordinator::{AcceptOutcome, RoutingConfig, RoutingCoordinator, RoutingStatus};
pub use engine::CreditEngine;
pub use error::OrchestrationError;
pub use ports::{
    ApproveAll, InMemoryInventory, InventoryPort, MessagingPort, OrderValidator, RecordingMessenger,
    RejectAll, SentNotice, StaticDirectory, VendorDirectory,
};
pub use selector::CandidateSelector;
pub use state_machine::{OrderStateMachine, ResponseOutcome, SweepReport};
pub use stores::{
    CreditStore, CreditStoreError, InMemoryCreditStore, InMemoryOrderStore, InMemoryRoutingStore,
    LockOutcome, OrderStore, OrderStoreError, RoutingStore, RoutingStoreError,
};
pub use sweeper::{SweeperConfig, SweeperHandle, SweeperStats, spawn as spawn_sweeper};
