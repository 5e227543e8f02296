//! Process-level observability wiring (tracing init).

pub mod tracing;

pub use crate::tracing::init;
