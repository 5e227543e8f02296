//! The immutable transition event published to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use tradeflow_core::{Actor, OrderId};
use tradeflow_orders::{OrderState, TransitionRecord};

/// One event per committed order transition.
///
/// The transition log is the source of truth; this is the distribution copy
/// handed to audit/analytics/UI subscribers. Consumers must be idempotent:
/// delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub event_id: Uuid,
    pub order_id: OrderId,
    pub from: OrderState,
    pub to: OrderState,
    pub actor: Actor,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub metadata: JsonValue,
}

impl TransitionEvent {
    pub fn from_record(record: &TransitionRecord) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            order_id: record.order_id,
            from: record.from,
            to: record.to,
            actor: record.actor,
            reason: record.reason.clone(),
            occurred_at: record.occurred_at,
            metadata: record.metadata.clone(),
        }
    }

    /// Stable event-type string for routing/consumers.
    pub fn event_type(&self) -> &'static str {
        match self.to {
            OrderState::Created => "order.created",
            OrderState::Validated => "order.validated",
            OrderState::CreditReserved => "order.credit_reserved",
            OrderState::VendorNotified => "order.vendor_notified",
            OrderState::VendorAccepted => "order.vendor_accepted",
            OrderState::VendorRejected => "order.vendor_rejected",
            OrderState::Fulfilled => "order.fulfilled",
            OrderState::Cancelled => "order.cancelled",
            OrderState::Failed => "order.failed",
        }
    }
}
