//! Routing records: one routing round per order, responses per vendor, and
//! auto-cancellation notices for the losers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use tradeflow_core::{OrderId, RoutingId, WholesalerId};

use crate::scoring::Candidate;

/// One routing round: the ranked candidate set and, eventually, the single
/// locked winner. `locked_wholesaler_id` is write-once; the store enforces
/// that with one atomic conditional update, never a check-then-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRouting {
    pub id: RoutingId,
    pub order_id: OrderId,
    pub candidates: Vec<Candidate>,
    pub locked_wholesaler_id: Option<WholesalerId>,
    pub locked_at: Option<DateTime<Utc>>,
    /// Bumped on every mutation; diagnostic only.
    pub version: u64,
    pub broadcast_at: DateTime<Utc>,
    /// No acceptance by this instant means the routing is exhausted.
    pub deadline: DateTime<Utc>,
}

impl VendorRouting {
    pub fn new(order_id: OrderId, candidates: Vec<Candidate>, deadline: DateTime<Utc>) -> Self {
        Self {
            id: RoutingId::new(),
            order_id,
            candidates,
            locked_wholesaler_id: None,
            locked_at: None,
            version: 0,
            broadcast_at: Utc::now(),
            deadline,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked_wholesaler_id.is_some()
    }

    pub fn is_candidate(&self, wholesaler_id: WholesalerId) -> bool {
        self.candidates
            .iter()
            .any(|c| c.wholesaler_id == wholesaler_id)
    }
}

/// What a vendor said (or failed to say) about a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    Accept,
    Reject,
    Timeout,
    Error,
}

/// One response per (routing, wholesaler); the unique pair makes repeats
/// idempotent rather than errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorResponse {
    pub routing_id: RoutingId,
    pub wholesaler_id: WholesalerId,
    pub kind: ResponseKind,
    /// Milliseconds between broadcast and this response.
    pub latency_ms: i64,
    pub payload: JsonValue,
    pub occurred_at: DateTime<Utc>,
}

impl VendorResponse {
    pub fn new(
        routing_id: RoutingId,
        wholesaler_id: WholesalerId,
        kind: ResponseKind,
        latency_ms: i64,
        payload: JsonValue,
    ) -> Self {
        Self {
            routing_id,
            wholesaler_id,
            kind,
            latency_ms,
            payload,
            occurred_at: Utc::now(),
        }
    }
}

/// Auto-cancellation notice sent to a losing vendor after a lock, and its
/// delivery confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorCancellation {
    pub routing_id: RoutingId,
    pub wholesaler_id: WholesalerId,
    pub notice_sent: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VendorCancellation {
    pub fn new(routing_id: RoutingId, wholesaler_id: WholesalerId, notice_sent: bool) -> Self {
        Self {
            routing_id,
            wholesaler_id,
            notice_sent,
            confirmed_at: None,
            created_at: Utc::now(),
        }
    }
}
