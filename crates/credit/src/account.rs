//! Credit accounts: one per (retailer, wholesaler) pair.

use serde::{Deserialize, Serialize};

use tradeflow_core::{RetailerId, WholesalerId};

/// Key of a credit line: the retailer draws against this wholesaler's limit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    pub retailer_id: RetailerId,
    pub wholesaler_id: WholesalerId,
}

impl AccountKey {
    pub fn new(retailer_id: RetailerId, wholesaler_id: WholesalerId) -> Self {
        Self {
            retailer_id,
            wholesaler_id,
        }
    }
}

impl core::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}→{}", self.retailer_id, self.wholesaler_id)
    }
}

/// Whether new reservations may be taken against the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Paused,
    Blocked,
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Paused => "PAUSED",
            AccountStatus::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

/// A wholesaler's credit line extended to one retailer.
///
/// The balance is never stored here; available credit is computed from the
/// reservation and ledger facts at decision time (see [`crate::ledger`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    pub key: AccountKey,
    /// Limit in smallest currency unit.
    pub limit: i64,
    pub status: AccountStatus,
}

impl CreditAccount {
    pub fn new(key: AccountKey, limit: i64) -> Self {
        Self {
            key,
            limit,
            status: AccountStatus::Active,
        }
    }
}
