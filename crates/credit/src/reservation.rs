//! Credit reservations (holds): a temporary claim against available credit
//! for one order, pending conversion to a debit or release.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_core::{LedgerEntryId, OrderId, ReservationId};

use crate::account::AccountKey;

/// Reservation lifecycle. `Released` and `ConvertedToDebit` are terminal and
/// immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Active,
    Released,
    ConvertedToDebit,
}

impl ReservationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Released => "RELEASED",
            ReservationStatus::ConvertedToDebit => "CONVERTED_TO_DEBIT",
        };
        f.write_str(s)
    }
}

/// A hold against one account for one order. At most one active reservation
/// exists per order (unique order id), which is what makes repeat `reserve`
/// calls idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditReservation {
    pub id: ReservationId,
    pub account: AccountKey,
    pub order_id: OrderId,
    /// Amount held, in smallest currency unit.
    pub amount: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when converted: the DEBIT ledger entry this hold became.
    pub ledger_entry_id: Option<LedgerEntryId>,
}

impl CreditReservation {
    pub fn new(account: AccountKey, order_id: OrderId, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            id: ReservationId::new(),
            account,
            order_id,
            amount,
            status: ReservationStatus::Active,
            created_at: now,
            updated_at: now,
            ledger_entry_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}
