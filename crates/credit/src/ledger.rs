//! Append-only ledger entries and the available-credit arithmetic.
//!
//! Available credit = limit − Σ(active reservations) − Σ(DEBIT) + Σ(CREDIT).
//! It is computed from the facts at decision time, under the account lock;
//! no cached balance exists to drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_core::{LedgerEntryId, OrderId};

use crate::account::AccountKey;
use crate::reservation::CreditReservation;

/// Side of a ledger fact. DEBIT increases the retailer's liability; CREDIT
/// reduces it (repayment, refund).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryKind {
    Debit,
    Credit,
}

/// One immutable ledger fact. Rows are appended, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub account: AccountKey,
    pub order_id: Option<OrderId>,
    pub kind: LedgerEntryKind,
    /// Positive amount in smallest currency unit.
    pub amount: i64,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        account: AccountKey,
        order_id: Option<OrderId>,
        kind: LedgerEntryKind,
        amount: i64,
        note: Option<String>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            account,
            order_id,
            kind,
            amount,
            note,
            occurred_at: Utc::now(),
        }
    }
}

/// Sum of active holds. Accumulates in i128 so pathological inputs cannot
/// wrap i64 mid-sum.
pub fn active_hold_total(reservations: &[CreditReservation]) -> i128 {
    reservations
        .iter()
        .filter(|r| r.is_active())
        .map(|r| r.amount as i128)
        .sum()
}

/// Net debits: Σ(DEBIT) − Σ(CREDIT).
pub fn net_debit_total(entries: &[LedgerEntry]) -> i128 {
    entries
        .iter()
        .map(|e| match e.kind {
            LedgerEntryKind::Debit => e.amount as i128,
            LedgerEntryKind::Credit => -(e.amount as i128),
        })
        .sum()
}

/// Available credit for one account, clamped into i64.
pub fn available_credit(
    limit: i64,
    reservations: &[CreditReservation],
    entries: &[LedgerEntry],
) -> i64 {
    let available =
        limit as i128 - active_hold_total(reservations) - net_debit_total(entries);
    available.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// The committed-state invariant: holds plus net debits never exceed the
/// limit. Checked by tests at commit boundaries.
pub fn within_limit(
    limit: i64,
    reservations: &[CreditReservation],
    entries: &[LedgerEntry],
) -> bool {
    active_hold_total(reservations) + net_debit_total(entries) <= limit as i128
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reservation::ReservationStatus;
    use proptest::prelude::*;
    use tradeflow_core::{RetailerId, WholesalerId};

    fn key() -> AccountKey {
        AccountKey::new(RetailerId::new(), WholesalerId::new())
    }

    fn hold(amount: i64, status: ReservationStatus) -> CreditReservation {
        let mut r = CreditReservation::new(key(), OrderId::new(), amount);
        r.status = status;
        r
    }

    fn entry(kind: LedgerEntryKind, amount: i64) -> LedgerEntry {
        LedgerEntry::new(key(), None, kind, amount, None)
    }

    #[test]
    fn available_credit_nets_holds_debits_and_credits() {
        let reservations = vec![
            hold(10_000, ReservationStatus::Active),
            hold(5_000, ReservationStatus::Released),
            hold(2_500, ReservationStatus::ConvertedToDebit),
        ];
        let entries = vec![
            entry(LedgerEntryKind::Debit, 2_500),
            entry(LedgerEntryKind::Credit, 1_000),
        ];
        // 50_000 - 10_000 (active only) - 2_500 + 1_000
        assert_eq!(available_credit(50_000, &reservations, &entries), 38_500);
    }

    #[test]
    fn released_and_converted_holds_do_not_count() {
        let reservations = vec![
            hold(40_000, ReservationStatus::Released),
            hold(40_000, ReservationStatus::ConvertedToDebit),
        ];
        assert_eq!(active_hold_total(&reservations), 0);
    }

    #[test]
    fn empty_account_has_full_limit_available() {
        assert_eq!(available_credit(75_000, &[], &[]), 75_000);
    }

    proptest! {
        /// Arithmetic identity: available + active holds + net debits == limit.
        #[test]
        fn available_plus_outstanding_equals_limit(
            limit in 0i64..1_000_000,
            holds in prop::collection::vec(1i64..50_000, 0..8),
            debits in prop::collection::vec(1i64..50_000, 0..8),
            credits in prop::collection::vec(1i64..50_000, 0..8),
        ) {
            let reservations: Vec<_> = holds
                .iter()
                .map(|a| hold(*a, ReservationStatus::Active))
                .collect();
            let mut entries: Vec<_> = debits
                .iter()
                .map(|a| entry(LedgerEntryKind::Debit, *a))
                .collect();
            entries.extend(credits.iter().map(|a| entry(LedgerEntryKind::Credit, *a)));

            let available = available_credit(limit, &reservations, &entries) as i128;
            let outstanding = active_hold_total(&reservations) + net_debit_total(&entries);
            prop_assert_eq!(available + outstanding, limit as i128);
        }

        /// within_limit agrees with the arithmetic.
        #[test]
        fn within_limit_matches_available_sign(
            limit in 0i64..100_000,
            holds in prop::collection::vec(1i64..60_000, 0..4),
        ) {
            let reservations: Vec<_> = holds
                .iter()
                .map(|a| hold(*a, ReservationStatus::Active))
                .collect();
            let ok = within_limit(limit, &reservations, &[]);
            let available = available_credit(limit, &reservations, &[]);
            prop_assert_eq!(ok, available >= 0);
        }
    }
}
