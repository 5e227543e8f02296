//! Credit subsystem rejections. Each carries the numeric context the UI
//! layer needs to render actionable feedback.

use tradeflow_core::ErrorCode;

use crate::account::AccountStatus;
use crate::reservation::ReservationStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreditError {
    /// The requested hold exceeds what the account can carry right now.
    #[error("insufficient credit: requested {requested}, available {available}")]
    InsufficientCredit { requested: i64, available: i64 },

    /// The account is not ACTIVE; no new holds may be taken.
    #[error("credit account is {status}; reservations are not permitted")]
    CreditBlocked { status: AccountStatus },

    /// Conversion attempted on a hold that is not ACTIVE (double conversion
    /// or convert-after-release). Logged as a caller bug.
    #[error("reservation is {status}, not ACTIVE")]
    ReservationNotActive { status: ReservationStatus },

    /// The account row stayed contended through the whole retry budget.
    /// Transient: the whole operation is safe to retry.
    #[error("account lock retries exhausted after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    #[error("no credit account for this retailer/wholesaler pair")]
    AccountNotFound,

    #[error("no reservation exists for this order")]
    ReservationNotFound,
}

impl ErrorCode for CreditError {
    fn code(&self) -> &'static str {
        match self {
            CreditError::InsufficientCredit { .. } => "INSUFFICIENT_CREDIT",
            CreditError::CreditBlocked { .. } => "CREDIT_BLOCKED",
            CreditError::ReservationNotActive { .. } => "RESERVATION_NOT_ACTIVE",
            CreditError::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
            CreditError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            CreditError::ReservationNotFound => "RESERVATION_NOT_FOUND",
        }
    }
}
