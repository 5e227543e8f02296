//! Transition events and their pub/sub distribution. One immutable event is
//! exposed per committed order transition for audit/analytics/UI consumers.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use event::TransitionEvent;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
