//! Append-only transition log rows.
//!
//! Rows are never updated or deleted; per-order timestamps are monotonic
//! because appends happen inside the per-order transition section.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use tradeflow_core::{Actor, OrderId};

use crate::state::OrderState;

/// One immutable row per committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub order_id: OrderId,
    pub from: OrderState,
    pub to: OrderState,
    /// Human-readable cause ("vendor accepted", "credit released on cancel").
    pub reason: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
    /// Free-form context (routing id, reservation id, shortfall numbers).
    pub metadata: JsonValue,
}

impl TransitionRecord {
    pub fn new(
        order_id: OrderId,
        from: OrderState,
        to: OrderState,
        actor: Actor,
        reason: Option<String>,
        metadata: JsonValue,
    ) -> Self {
        Self {
            order_id,
            from,
            to,
            reason,
            actor,
            occurred_at: Utc::now(),
            metadata,
        }
    }
}

/// Validate that a log sequence is a legal walk of the transition table and
/// chains correctly (each row's `from` equals the previous row's `to`).
/// Used by audit tooling and tests.
pub fn is_valid_walk(records: &[TransitionRecord]) -> bool {
    let mut previous: Option<&TransitionRecord> = None;
    for record in records {
        if record.from.is_terminal() || !record.from.can_transition_to(record.to) {
            return false;
        }
        if let Some(prev) = previous {
            if prev.to != record.from || prev.occurred_at > record.occurred_at {
                return false;
            }
        }
        previous = Some(record);
    }
    true
}
