//! Routing coordinator: broadcast, response intake, the acceptance race,
//! loser auto-cancellation, and timeout sweeping.
//!
//! The coordinator owns no order state. It resolves who won a routing round;
//! the state machine service decides what that means for the order.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info, warn};

use tradeflow_core::{OrderId, RoutingId, WholesalerId};
use tradeflow_orders::Order;
use tradeflow_routing::{
    Candidate, ResponseKind, VendorCancellation, VendorResponse, VendorRouting,
};

use crate::error::OrchestrationError;
use crate::ports::MessagingPort;
use crate::stores::{LockOutcome, RoutingStore};

/// Timing knobs for a routing round.
#[derive(Debug, Clone, Copy)]
pub struct RoutingConfig {
    /// A candidate with no response after this long is swept to TIMEOUT.
    pub response_ttl: Duration,
    /// No locked winner by broadcast + this window means the round is
    /// exhausted and the order fails.
    pub routing_deadline: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            response_ttl: Duration::minutes(10),
            routing_deadline: Duration::minutes(30),
        }
    }
}

impl RoutingConfig {
    pub fn with_response_ttl(mut self, ttl: Duration) -> Self {
        self.response_ttl = ttl;
        self
    }

    pub fn with_routing_deadline(mut self, deadline: Duration) -> Self {
        self.routing_deadline = deadline;
        self
    }
}

/// Why an acceptance did or did not take the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// This acceptance locked the round.
    Won,
    /// The caller had already locked the round; nothing changed.
    AlreadyAccepted,
    /// Someone else locked first.
    LostRace { winner: WholesalerId },
}

impl AcceptOutcome {
    pub fn accepted(self) -> bool {
        matches!(self, AcceptOutcome::Won | AcceptOutcome::AlreadyAccepted)
    }
}

/// Snapshot of one routing round for status queries.
#[derive(Debug, Clone)]
pub struct RoutingStatus {
    pub routing: VendorRouting,
    pub responses: Vec<VendorResponse>,
    pub cancellations: Vec<VendorCancellation>,
}

pub struct RoutingCoordinator {
    store: Arc<dyn RoutingStore>,
    messenger: Arc<dyn MessagingPort>,
    config: RoutingConfig,
}

impl RoutingCoordinator {
    pub fn new(
        store: Arc<dyn RoutingStore>,
        messenger: Arc<dyn MessagingPort>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            store,
            messenger,
            config,
        }
    }

    fn broadcast_payload(order: &Order, routing: &VendorRouting) -> JsonValue {
        json!({
            "routing_id": routing.id.to_string(),
            "order_id": order.id.to_string(),
            "retailer_id": order.retailer_id.to_string(),
            "total_amount": order.total_amount,
            "line_count": order.lines.len(),
            "respond_by": routing.deadline.to_rfc3339(),
        })
    }

    fn notify_best_effort(&self, recipient: WholesalerId, template: &str, payload: &JsonValue) {
        if let Err(err) = self.messenger.notify(recipient, template, payload) {
            // The round stands regardless; the sweep catches silent vendors.
            warn!(recipient = %recipient, template, error = %err, "vendor notice failed");
        }
    }

    /// Open a routing round: persist the candidate set, then notify every
    /// candidate. Notification failures degrade to timeouts, never abort.
    pub fn broadcast(
        &self,
        order: &Order,
        candidates: Vec<Candidate>,
    ) -> Result<VendorRouting, OrchestrationError> {
        let routing = VendorRouting::new(
            order.id,
            candidates,
            Utc::now() + self.config.routing_deadline,
        );
        self.store.create(routing.clone())?;
        let payload = Self::broadcast_payload(order, &routing);
        for candidate in &routing.candidates {
            self.notify_best_effort(candidate.wholesaler_id, "vendor_broadcast", &payload);
        }
        info!(
            order_id = %order.id,
            routing_id = %routing.id,
            candidates = routing.candidates.len(),
            "routing round broadcast"
        );
        Ok(routing)
    }

    /// Open a replacement round excluding prior winners/losers, after the
    /// locked vendor backed out.
    pub fn rebroadcast(
        &self,
        order: &Order,
        candidates: Vec<Candidate>,
    ) -> Result<VendorRouting, OrchestrationError> {
        let routing = VendorRouting::new(
            order.id,
            candidates,
            Utc::now() + self.config.routing_deadline,
        );
        self.store.supersede(routing.clone())?;
        let payload = Self::broadcast_payload(order, &routing);
        for candidate in &routing.candidates {
            self.notify_best_effort(candidate.wholesaler_id, "vendor_broadcast", &payload);
        }
        info!(order_id = %order.id, routing_id = %routing.id, "routing round re-broadcast");
        Ok(routing)
    }

    pub fn routing_for_order(&self, order_id: OrderId) -> Result<VendorRouting, OrchestrationError> {
        Ok(self.store.find_by_order(order_id)?)
    }

    /// Record a vendor's response. Returns whether this was the first
    /// response from that vendor for the round.
    pub fn record_response(
        &self,
        routing_id: RoutingId,
        wholesaler_id: WholesalerId,
        kind: ResponseKind,
        payload: JsonValue,
    ) -> Result<bool, OrchestrationError> {
        let routing = self.store.get(routing_id)?;
        let latency_ms = (Utc::now() - routing.broadcast_at).num_milliseconds();
        let inserted = self.store.record_response(VendorResponse::new(
            routing_id,
            wholesaler_id,
            kind,
            latency_ms,
            payload,
        ))?;
        debug!(
            routing_id = %routing_id,
            wholesaler_id = %wholesaler_id,
            ?kind,
            latency_ms,
            inserted,
            "vendor response recorded"
        );
        Ok(inserted)
    }

    /// Resolve an acceptance against the winner lock. Pure race resolution;
    /// the caller transitions the order on `Won`.
    pub fn accept(
        &self,
        routing_id: RoutingId,
        wholesaler_id: WholesalerId,
    ) -> Result<AcceptOutcome, OrchestrationError> {
        let outcome = match self.store.try_lock_winner(routing_id, wholesaler_id)? {
            LockOutcome::Won => AcceptOutcome::Won,
            LockOutcome::AlreadyLockedBySelf => AcceptOutcome::AlreadyAccepted,
            LockOutcome::AlreadyLockedByOther(winner) => AcceptOutcome::LostRace { winner },
        };
        info!(routing_id = %routing_id, wholesaler_id = %wholesaler_id, ?outcome, "acceptance resolved");
        Ok(outcome)
    }

    /// Send one cancellation notice to every non-winning candidate. Losers
    /// with a cancellation row already on file are skipped entirely, notice
    /// included, so repeat calls re-send nothing. Returns how many were
    /// newly recorded.
    pub fn send_auto_cancellations(
        &self,
        routing_id: RoutingId,
    ) -> Result<u32, OrchestrationError> {
        let routing = self.store.get(routing_id)?;
        let Some(winner) = routing.locked_wholesaler_id else {
            return Ok(0);
        };
        let payload = json!({
            "routing_id": routing.id.to_string(),
            "order_id": routing.order_id.to_string(),
            "reason": "another vendor accepted first",
        });
        let already_cancelled: Vec<WholesalerId> = self
            .store
            .cancellations(routing_id)?
            .iter()
            .map(|c| c.wholesaler_id)
            .collect();
        let mut sent = 0u32;
        for candidate in routing
            .candidates
            .iter()
            .filter(|c| c.wholesaler_id != winner)
            .filter(|c| !already_cancelled.contains(&c.wholesaler_id))
        {
            let delivered = self
                .messenger
                .notify(candidate.wholesaler_id, "vendor_auto_cancel", &payload)
                .map_err(|err| {
                    warn!(
                        wholesaler_id = %candidate.wholesaler_id,
                        error = %err,
                        "auto-cancel notice failed"
                    );
                })
                .is_ok();
            let inserted = self.store.record_cancellation(VendorCancellation::new(
                routing_id,
                candidate.wholesaler_id,
                delivered,
            ))?;
            if inserted {
                sent += 1;
            }
        }
        info!(routing_id = %routing_id, sent, "auto-cancellations processed");
        Ok(sent)
    }

    /// Tell the locked winner the order closed underneath it (cancel racing
    /// an acceptance). Best-effort.
    pub fn notify_order_closed(&self, order_id: OrderId, wholesaler_id: WholesalerId) {
        let payload = json!({
            "order_id": order_id.to_string(),
            "reason": "order closed before fulfillment",
        });
        self.notify_best_effort(wholesaler_id, "order_closed", &payload);
    }

    /// Record TIMEOUT responses for candidates silent past the TTL on one
    /// open round. Returns how many were recorded.
    pub fn sweep_round(
        &self,
        routing: &VendorRouting,
        now: DateTime<Utc>,
    ) -> Result<u32, OrchestrationError> {
        if now - routing.broadcast_at < self.config.response_ttl {
            return Ok(0);
        }
        let responded: Vec<WholesalerId> = self
            .store
            .responses(routing.id)?
            .iter()
            .map(|r| r.wholesaler_id)
            .collect();
        let mut recorded = 0u32;
        for candidate in &routing.candidates {
            if responded.contains(&candidate.wholesaler_id) {
                continue;
            }
            let inserted = self.store.record_response(VendorResponse::new(
                routing.id,
                candidate.wholesaler_id,
                ResponseKind::Timeout,
                (now - routing.broadcast_at).num_milliseconds(),
                JsonValue::Null,
            ))?;
            if inserted {
                recorded += 1;
            }
        }
        if recorded > 0 {
            info!(routing_id = %routing.id, recorded, "silent vendors timed out");
        }
        Ok(recorded)
    }

    /// All open rounds, for the sweeper.
    pub fn open_rounds(&self) -> Result<Vec<VendorRouting>, OrchestrationError> {
        Ok(self.store.list_open()?)
    }

    /// True when the round has no winner and its deadline has passed.
    pub fn is_exhausted(&self, routing: &VendorRouting, now: DateTime<Utc>) -> bool {
        !routing.is_locked() && now > routing.deadline
    }

    pub fn status(&self, order_id: OrderId) -> Result<RoutingStatus, OrchestrationError> {
        let routing = self.store.find_by_order(order_id)?;
        let responses = self.store.responses(routing.id)?;
        let cancellations = self.store.cancellations(routing.id)?;
        Ok(RoutingStatus {
            routing,
            responses,
            cancellations,
        })
    }

    /// True when every candidate has a recorded non-accept response and the
    /// round is unlocked (everyone declined or timed out).
    pub fn all_declined(&self, routing_id: RoutingId) -> Result<bool, OrchestrationError> {
        let routing = self.store.get(routing_id)?;
        if routing.is_locked() {
            return Ok(false);
        }
        let responses = self.store.responses(routing_id)?;
        let declined = routing.candidates.iter().all(|c| {
            responses
                .iter()
                .any(|r| r.wholesaler_id == c.wholesaler_id && r.kind != ResponseKind::Accept)
        });
        Ok(declined)
    }
}
