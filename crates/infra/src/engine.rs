//! Credit reservation engine.
//!
//! Wraps the credit store with the bounded-backoff retry loop for `Busy`
//! rows. Domain rejections (insufficient credit, blocked account) are fatal
//! and surface on the first attempt; only row contention is retried, and an
//! exhausted budget surfaces as `MAX_RETRIES_EXCEEDED`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tradeflow_core::{OrderId, RetryOutcome, RetryPolicy};
use tradeflow_credit::{
    AccountKey, AccountStatus, CreditAccount, CreditError, CreditReservation, LedgerEntry,
};

use crate::error::OrchestrationError;
use crate::stores::{CreditStore, CreditStoreError};

pub struct CreditEngine {
    store: Arc<dyn CreditStore>,
    policy: RetryPolicy,
}

impl CreditEngine {
    pub fn new(store: Arc<dyn CreditStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    fn with_retry<T>(
        &self,
        mut op: impl FnMut() -> Result<T, CreditStoreError>,
    ) -> Result<T, OrchestrationError> {
        let outcome = self
            .policy
            .run(&mut op, |e| matches!(e, CreditStoreError::Busy));
        match outcome {
            Ok(value) => Ok(value),
            Err(RetryOutcome::Fatal(e)) => Err(e.into()),
            Err(RetryOutcome::Exhausted { attempts, .. }) => {
                warn!(attempts, "credit account stayed contended; giving up");
                Err(CreditError::MaxRetriesExceeded { attempts }.into())
            }
        }
    }

    pub fn upsert_account(&self, account: CreditAccount) -> Result<(), OrchestrationError> {
        Ok(self.store.upsert_account(account)?)
    }

    pub fn account(&self, key: AccountKey) -> Result<CreditAccount, OrchestrationError> {
        Ok(self.store.account(key)?)
    }

    pub fn set_account_status(
        &self,
        key: AccountKey,
        status: AccountStatus,
    ) -> Result<(), OrchestrationError> {
        info!(account = %key, %status, "credit account status change");
        self.with_retry(|| self.store.set_account_status(key, status))
    }

    pub fn available_credit(&self, key: AccountKey) -> Result<i64, OrchestrationError> {
        self.with_retry(|| self.store.available_credit(key))
    }

    /// Place (or re-read, when repeated) the hold for one order.
    pub fn reserve(
        &self,
        key: AccountKey,
        order_id: OrderId,
        amount: i64,
    ) -> Result<CreditReservation, OrchestrationError> {
        let reservation = self.with_retry(|| self.store.reserve(key, order_id, amount))?;
        debug!(
            account = %key,
            order_id = %order_id,
            amount,
            reservation_id = %reservation.id,
            "credit reserved"
        );
        Ok(reservation)
    }

    /// Release the order's hold; no-op when none exists.
    pub fn release(
        &self,
        order_id: OrderId,
    ) -> Result<Option<CreditReservation>, OrchestrationError> {
        let released = self.with_retry(|| self.store.release(order_id))?;
        if let Some(reservation) = &released {
            debug!(order_id = %order_id, reservation_id = %reservation.id, "credit released");
        }
        Ok(released)
    }

    /// Convert the order's hold into a DEBIT ledger entry, exactly once.
    pub fn convert_to_debit(
        &self,
        order_id: OrderId,
    ) -> Result<(CreditReservation, LedgerEntry), OrchestrationError> {
        let (reservation, entry) = self.with_retry(|| self.store.convert_to_debit(order_id))?;
        info!(
            order_id = %order_id,
            ledger_entry_id = %entry.id,
            amount = entry.amount,
            "reservation converted to debit"
        );
        Ok((reservation, entry))
    }

    /// Post a repayment/refund, freeing capacity.
    pub fn post_credit(
        &self,
        key: AccountKey,
        amount: i64,
        order_id: Option<OrderId>,
        note: Option<String>,
    ) -> Result<LedgerEntry, OrchestrationError> {
        let entry = self.with_retry(|| self.store.post_credit(key, amount, order_id, note.clone()))?;
        info!(account = %key, amount, "credit posted");
        Ok(entry)
    }

    pub fn reservation_for(
        &self,
        order_id: OrderId,
    ) -> Result<Option<CreditReservation>, OrchestrationError> {
        Ok(self.store.reservation_for(order_id)?)
    }
}
