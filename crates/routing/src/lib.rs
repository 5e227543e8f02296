//! Vendor routing domain: candidate scoring and the routing/response/
//! cancellation records. The coordinator that broadcasts, records responses,
//! and resolves the first-acceptance race lives in `tradeflow-infra`.

pub mod error;
pub mod records;
pub mod scoring;

pub use error::RoutingError;
pub use records::{ResponseKind, VendorCancellation, VendorResponse, VendorRouting};
pub use scoring::{AvailabilityBand, Candidate, VendorProfile, score_candidates};
