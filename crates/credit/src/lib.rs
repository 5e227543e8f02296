//! Credit domain: accounts, reservations (holds), the append-only ledger,
//! and the available-credit arithmetic. The reservation engine that applies
//! these rules under the account row lock lives in `tradeflow-infra`.

pub mod account;
pub mod error;
pub mod ledger;
pub mod reservation;

pub use account::{AccountKey, AccountStatus, CreditAccount};
pub use error::CreditError;
pub use ledger::{
    LedgerEntry, LedgerEntryKind, active_hold_total, available_credit, net_debit_total,
    within_limit,
};
pub use reservation::{CreditReservation, ReservationStatus};
