//! Credit persistence: account rows, reservations, and the ledger.
//!
//! Each account is one row guarded by its own mutex. A store method locks
//! the row, computes available credit from the facts, and applies its write
//! before unlocking, so the decision and the write are one atomic section.
//! Contention surfaces as `Busy`; the engine above retries with backoff.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, TryLockError};

use tradeflow_core::OrderId;
use tradeflow_credit::{
    AccountKey, AccountStatus, CreditAccount, CreditError, CreditReservation, LedgerEntry,
    LedgerEntryKind, ReservationStatus, available_credit,
};

use crate::error::OrchestrationError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreditStoreError {
    /// The account row is locked by another operation. Transient.
    #[error("credit account row is busy")]
    Busy,

    #[error(transparent)]
    Domain(#[from] CreditError),

    #[error("credit storage failure: {0}")]
    Internal(String),
}

impl From<CreditStoreError> for OrchestrationError {
    fn from(err: CreditStoreError) -> Self {
        match err {
            CreditStoreError::Domain(e) => OrchestrationError::Credit(e),
            other => OrchestrationError::Store(other.to_string()),
        }
    }
}

/// Transactional credit storage. Mutating methods are atomic per account.
pub trait CreditStore: Send + Sync {
    fn upsert_account(&self, account: CreditAccount) -> Result<(), CreditStoreError>;

    fn account(&self, key: AccountKey) -> Result<CreditAccount, CreditStoreError>;

    fn set_account_status(
        &self,
        key: AccountKey,
        status: AccountStatus,
    ) -> Result<(), CreditStoreError>;

    /// Available credit computed from current facts under the row lock.
    fn available_credit(&self, key: AccountKey) -> Result<i64, CreditStoreError>;

    /// Place a hold for one order. Idempotent per order: a repeat call while
    /// the hold is ACTIVE returns the existing reservation unchanged; a
    /// repeat after the hold went terminal is rejected.
    fn reserve(
        &self,
        key: AccountKey,
        order_id: OrderId,
        amount: i64,
    ) -> Result<CreditReservation, CreditStoreError>;

    /// Release the order's hold. `Ok(None)` when no reservation exists
    /// (cancellation before reservation); releasing a RELEASED hold again is
    /// a no-op returning the existing row.
    fn release(&self, order_id: OrderId) -> Result<Option<CreditReservation>, CreditStoreError>;

    /// Convert the order's ACTIVE hold into a DEBIT ledger entry. Exactly
    /// once: a second call finds the hold terminal and is rejected without
    /// writing a second debit.
    fn convert_to_debit(
        &self,
        order_id: OrderId,
    ) -> Result<(CreditReservation, LedgerEntry), CreditStoreError>;

    /// Append a CREDIT entry (repayment, refund), freeing capacity.
    fn post_credit(
        &self,
        key: AccountKey,
        amount: i64,
        order_id: Option<OrderId>,
        note: Option<String>,
    ) -> Result<LedgerEntry, CreditStoreError>;

    fn reservation_for(
        &self,
        order_id: OrderId,
    ) -> Result<Option<CreditReservation>, CreditStoreError>;

    fn reservations(&self, key: AccountKey) -> Result<Vec<CreditReservation>, CreditStoreError>;

    fn entries(&self, key: AccountKey) -> Result<Vec<LedgerEntry>, CreditStoreError>;
}

#[derive(Debug)]
struct AccountRow {
    account: CreditAccount,
    reservations: Vec<CreditReservation>,
    entries: Vec<LedgerEntry>,
}

impl AccountRow {
    fn available(&self) -> i64 {
        available_credit(self.account.limit, &self.reservations, &self.entries)
    }

    fn reservation_mut(&mut self, order_id: OrderId) -> Option<&mut CreditReservation> {
        self.reservations.iter_mut().find(|r| r.order_id == order_id)
    }
}

/// In-memory credit store. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCreditStore {
    accounts: RwLock<HashMap<AccountKey, Arc<Mutex<AccountRow>>>>,
    /// Which account holds each order's reservation.
    order_index: RwLock<HashMap<OrderId, AccountKey>>,
}

fn poisoned(_: impl core::fmt::Debug) -> CreditStoreError {
    CreditStoreError::Internal("lock poisoned".to_string())
}

impl InMemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, key: AccountKey) -> Result<Arc<Mutex<AccountRow>>, CreditStoreError> {
        self.accounts
            .read()
            .map_err(poisoned)?
            .get(&key)
            .cloned()
            .ok_or(CreditStoreError::Domain(CreditError::AccountNotFound))
    }

    /// Try-lock an account row; contention maps to `Busy` for the caller's
    /// retry loop rather than blocking.
    fn with_row<T>(
        &self,
        key: AccountKey,
        op: impl FnOnce(&mut AccountRow) -> Result<T, CreditStoreError>,
    ) -> Result<T, CreditStoreError> {
        let row = self.row(key)?;
        let mut guard = match row.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(CreditStoreError::Busy),
            Err(TryLockError::Poisoned(e)) => return Err(poisoned(e)),
        };
        op(&mut guard)
    }

    fn account_for_order(&self, order_id: OrderId) -> Result<Option<AccountKey>, CreditStoreError> {
        Ok(self
            .order_index
            .read()
            .map_err(poisoned)?
            .get(&order_id)
            .copied())
    }
}

impl CreditStore for InMemoryCreditStore {
    fn upsert_account(&self, account: CreditAccount) -> Result<(), CreditStoreError> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        match accounts.get(&account.key) {
            Some(row) => {
                let mut guard = row.lock().map_err(poisoned)?;
                guard.account = account;
            }
            None => {
                accounts.insert(
                    account.key,
                    Arc::new(Mutex::new(AccountRow {
                        account,
                        reservations: Vec::new(),
                        entries: Vec::new(),
                    })),
                );
            }
        }
        Ok(())
    }

    fn account(&self, key: AccountKey) -> Result<CreditAccount, CreditStoreError> {
        let row = self.row(key)?;
        let guard = row.lock().map_err(poisoned)?;
        Ok(guard.account.clone())
    }

    fn set_account_status(
        &self,
        key: AccountKey,
        status: AccountStatus,
    ) -> Result<(), CreditStoreError> {
        self.with_row(key, |row| {
            row.account.status = status;
            Ok(())
        })
    }

    fn available_credit(&self, key: AccountKey) -> Result<i64, CreditStoreError> {
        self.with_row(key, |row| Ok(row.available()))
    }

    fn reserve(
        &self,
        key: AccountKey,
        order_id: OrderId,
        amount: i64,
    ) -> Result<CreditReservation, CreditStoreError> {
        self.with_row(key, |row| {
            if let Some(existing) = row.reservation_mut(order_id) {
                return if existing.is_active() {
                    Ok(existing.clone())
                } else {
                    Err(CreditError::ReservationNotActive {
                        status: existing.status,
                    }
                    .into())
                };
            }
            if row.account.status != AccountStatus::Active {
                return Err(CreditError::CreditBlocked {
                    status: row.account.status,
                }
                .into());
            }
            let available = row.available();
            if amount > available {
                return Err(CreditError::InsufficientCredit {
                    requested: amount,
                    available,
                }
                .into());
            }
            let reservation = CreditReservation::new(key, order_id, amount);
            row.reservations.push(reservation.clone());
            // Index the order while the row lock is held so the reservation
            // is findable the instant reserve returns.
            self.order_index
                .write()
                .map_err(poisoned)?
                .insert(order_id, key);
            Ok(reservation)
        })
    }

    fn release(&self, order_id: OrderId) -> Result<Option<CreditReservation>, CreditStoreError> {
        let Some(key) = self.account_for_order(order_id)? else {
            return Ok(None);
        };
        self.with_row(key, |row| {
            let Some(reservation) = row.reservation_mut(order_id) else {
                return Ok(None);
            };
            match reservation.status {
                ReservationStatus::Active => {
                    reservation.status = ReservationStatus::Released;
                    reservation.updated_at = chrono::Utc::now();
                    Ok(Some(reservation.clone()))
                }
                ReservationStatus::Released => Ok(Some(reservation.clone())),
                ReservationStatus::ConvertedToDebit => Err(CreditError::ReservationNotActive {
                    status: reservation.status,
                }
                .into()),
            }
        })
    }

    fn convert_to_debit(
        &self,
        order_id: OrderId,
    ) -> Result<(CreditReservation, LedgerEntry), CreditStoreError> {
        let key = self
            .account_for_order(order_id)?
            .ok_or(CreditStoreError::Domain(CreditError::ReservationNotFound))?;
        self.with_row(key, |row| {
            let Some(reservation) = row.reservation_mut(order_id) else {
                return Err(CreditError::ReservationNotFound.into());
            };
            if !reservation.is_active() {
                return Err(CreditError::ReservationNotActive {
                    status: reservation.status,
                }
                .into());
            }
            let entry = LedgerEntry::new(
                key,
                Some(order_id),
                LedgerEntryKind::Debit,
                reservation.amount,
                Some("converted from reservation".to_string()),
            );
            reservation.status = ReservationStatus::ConvertedToDebit;
            reservation.ledger_entry_id = Some(entry.id);
            reservation.updated_at = chrono::Utc::now();
            let reservation = reservation.clone();
            row.entries.push(entry.clone());
            Ok((reservation, entry))
        })
    }

    fn post_credit(
        &self,
        key: AccountKey,
        amount: i64,
        order_id: Option<OrderId>,
        note: Option<String>,
    ) -> Result<LedgerEntry, CreditStoreError> {
        self.with_row(key, |row| {
            let entry = LedgerEntry::new(key, order_id, LedgerEntryKind::Credit, amount, note);
            row.entries.push(entry.clone());
            Ok(entry)
        })
    }

    fn reservation_for(
        &self,
        order_id: OrderId,
    ) -> Result<Option<CreditReservation>, CreditStoreError> {
        let Some(key) = self.account_for_order(order_id)? else {
            return Ok(None);
        };
        let row = self.row(key)?;
        let guard = row.lock().map_err(poisoned)?;
        Ok(guard
            .reservations
            .iter()
            .find(|r| r.order_id == order_id)
            .cloned())
    }

    fn reservations(&self, key: AccountKey) -> Result<Vec<CreditReservation>, CreditStoreError> {
        let row = self.row(key)?;
        let guard = row.lock().map_err(poisoned)?;
        Ok(guard.reservations.clone())
    }

    fn entries(&self, key: AccountKey) -> Result<Vec<LedgerEntry>, CreditStoreError> {
        let row = self.row(key)?;
        let guard = row.lock().map_err(poisoned)?;
        Ok(guard.entries.clone())
    }
}
