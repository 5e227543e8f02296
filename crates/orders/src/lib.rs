//! Order domain: the order model, the strict state machine table, and the
//! append-only transition log rows. Pure decision logic only; persistence
//! and side effects live in `tradeflow-infra`.

pub mod log;
pub mod model;
pub mod state;

pub use log::{TransitionRecord, is_valid_walk};
pub use model::{Order, OrderBuildError, OrderLine};
pub use state::{OrderState, TransitionError, check_transition};
