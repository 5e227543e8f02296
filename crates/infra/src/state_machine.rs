//! The order state machine service: the only writer of `Order::state`.
//!
//! Every transition runs inside the per-order section: re-read the order,
//! check the table, run the side effect, write the state and the log row,
//! publish the event. Credit and routing stores take their own locks and
//! never take an order section, so lock order is always order-then-subsystem
//! and cannot cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};

use tradeflow_core::{Actor, OrderId, RetailerId, WholesalerId};
use tradeflow_credit::AccountKey;
use tradeflow_events::{EventBus, TransitionEvent};
use tradeflow_orders::{
    Order, OrderLine, OrderState, TransitionRecord, check_transition,
};
use tradeflow_routing::ResponseKind;

use crate::coordinator::{AcceptOutcome, RoutingCoordinator, RoutingStatus};
use crate::engine::CreditEngine;
use crate::error::OrchestrationError;
use crate::ports::{InventoryPort, OrderValidator};
use crate::selector::CandidateSelector;
use crate::stores::OrderStore;

/// What came of one inbound vendor response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The acceptance won; the order is VENDOR_ACCEPTED.
    Accepted,
    /// Duplicate acceptance from the standing winner; nothing changed.
    AlreadyWinner,
    /// Another vendor had already won.
    LostRace { winner: WholesalerId },
    /// The acceptance won the round, but the order had already closed
    /// (cancelled or failed); the vendor was told the order is gone.
    OrderClosed,
    /// A rejection was recorded; other candidates are still pending.
    RejectionRecorded,
    /// Every candidate declined; the order moved to VENDOR_REJECTED.
    AllDeclined,
    /// A timeout/error report was recorded.
    Recorded,
}

/// Per-tick summary from the timeout sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rounds_checked: u64,
    pub timeouts_recorded: u64,
    pub orders_failed: u64,
}

pub struct OrderStateMachine<B> {
    orders: Arc<dyn OrderStore>,
    credit: CreditEngine,
    coordinator: RoutingCoordinator,
    selector: CandidateSelector,
    inventory: Arc<dyn InventoryPort>,
    validator: Arc<dyn OrderValidator>,
    bus: B,
    /// Per-order transition sections.
    sections: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
}

impl<B> OrderStateMachine<B>
where
    B: EventBus<TransitionEvent>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        credit: CreditEngine,
        coordinator: RoutingCoordinator,
        selector: CandidateSelector,
        inventory: Arc<dyn InventoryPort>,
        validator: Arc<dyn OrderValidator>,
        bus: B,
    ) -> Self {
        Self {
            orders,
            credit,
            coordinator,
            selector,
            inventory,
            validator,
            bus,
            sections: Mutex::new(HashMap::new()),
        }
    }

    pub fn credit(&self) -> &CreditEngine {
        &self.credit
    }

    pub fn coordinator(&self) -> &RoutingCoordinator {
        &self.coordinator
    }

    fn section(&self, order_id: OrderId) -> Result<Arc<Mutex<()>>, OrchestrationError> {
        let mut sections = self
            .sections
            .lock()
            .map_err(|_| OrchestrationError::Store("lock poisoned".to_string()))?;
        Ok(sections.entry(order_id).or_default().clone())
    }

    // -----------------------------------------------------------------
    // Order intake
    // -----------------------------------------------------------------

    /// Persist a new order in CREATED.
    pub fn create_order(
        &self,
        retailer_id: RetailerId,
        credit_wholesaler_id: WholesalerId,
        lines: Vec<OrderLine>,
    ) -> Result<Order, OrchestrationError> {
        let order = Order::new(retailer_id, credit_wholesaler_id, lines)?;
        self.orders.insert(order.clone())?;
        info!(
            order_id = %order.id,
            retailer_id = %retailer_id,
            total_amount = order.total_amount,
            "order created"
        );
        Ok(order)
    }

    // -----------------------------------------------------------------
    // The transition primitive
    // -----------------------------------------------------------------

    /// Run one transition under the per-order section. Rejections mutate
    /// nothing; side-effect failures abort before the state write.
    pub fn transition(
        &self,
        order_id: OrderId,
        target: OrderState,
        actor: Actor,
        reason: Option<String>,
        metadata: JsonValue,
    ) -> Result<Order, OrchestrationError> {
        let section = self.section(order_id)?;
        let _guard = section
            .lock()
            .map_err(|_| OrchestrationError::Store("lock poisoned".to_string()))?;

        let order = self.orders.get(order_id)?;
        check_transition(order.state, target)?;

        let extra = self.apply_side_effect(&order, target)?;
        let metadata = merge_metadata(metadata, extra);

        let from = order.state;
        let updated = self.orders.set_state(order_id, target)?;
        let record =
            TransitionRecord::new(order_id, from, target, actor, reason, metadata);
        self.orders.append_transition(record.clone())?;

        if let Err(err) = self.bus.publish(TransitionEvent::from_record(&record)) {
            // The log row is the source of truth; a dropped event only
            // affects live subscribers.
            warn!(order_id = %order_id, ?err, "transition event publish failed");
        }
        info!(order_id = %order_id, %from, to = %target, actor = %record.actor, "order transitioned");
        Ok(updated)
    }

    /// Side effects tied to specific edges. Runs before the state write, so
    /// a failure leaves the order untouched.
    fn apply_side_effect(
        &self,
        order: &Order,
        target: OrderState,
    ) -> Result<JsonValue, OrchestrationError> {
        match (order.state, target) {
            (OrderState::Created, OrderState::Validated) => {
                self.validator
                    .validate(order)
                    .map_err(|reason| OrchestrationError::ValidationFailed { reason })?;
                Ok(JsonValue::Null)
            }
            (OrderState::Validated, OrderState::CreditReserved) => {
                let key = AccountKey::new(order.retailer_id, order.credit_wholesaler_id);
                let reservation = self.credit.reserve(key, order.id, order.total_amount)?;
                Ok(json!({ "reservation_id": reservation.id.to_string() }))
            }
            (OrderState::CreditReserved, OrderState::VendorNotified) => {
                let candidates = self.selector.select(order)?;
                let routing = self.coordinator.broadcast(order, candidates)?;
                Ok(json!({
                    "routing_id": routing.id.to_string(),
                    "candidates": routing.candidates.len(),
                }))
            }
            (OrderState::VendorNotified, OrderState::VendorAccepted) => {
                let routing = self.coordinator.routing_for_order(order.id)?;
                let winner = routing.locked_wholesaler_id.ok_or_else(|| {
                    OrchestrationError::Store(
                        "acceptance transition without a locked winner".to_string(),
                    )
                })?;
                self.orders.assign_wholesaler(order.id, winner)?;
                Ok(json!({
                    "routing_id": routing.id.to_string(),
                    "wholesaler_id": winner.to_string(),
                }))
            }
            (OrderState::VendorAccepted, OrderState::Fulfilled) => {
                let winner = order.wholesaler_id.ok_or_else(|| {
                    OrchestrationError::Store("fulfillment without an assigned vendor".to_string())
                })?;
                self.inventory
                    .deduct(winner, &order.lines)
                    .map_err(|err| OrchestrationError::Store(format!("stock deduction failed: {err}")))?;
                let (_, entry) = self.credit.convert_to_debit(order.id)?;
                Ok(json!({ "ledger_entry_id": entry.id.to_string() }))
            }
            (_, OrderState::Cancelled) | (_, OrderState::Failed) => {
                // Idempotent: a no-op when no hold was ever taken.
                let released = self.credit.release(order.id)?;
                if let Some(winner) = order.wholesaler_id {
                    self.coordinator.notify_order_closed(order.id, winner);
                }
                match released {
                    Some(reservation) => {
                        Ok(json!({ "released_reservation_id": reservation.id.to_string() }))
                    }
                    None => Ok(JsonValue::Null),
                }
            }
            _ => Ok(JsonValue::Null),
        }
    }

    // -----------------------------------------------------------------
    // Drivers
    // -----------------------------------------------------------------

    /// Drive a CREATED order through validation, credit, and broadcast. Any
    /// rejection along the way fails the order (releasing the hold when one
    /// exists) and then surfaces to the caller.
    pub fn submit(&self, order_id: OrderId) -> Result<Order, OrchestrationError> {
        let chain = [
            OrderState::Validated,
            OrderState::CreditReserved,
            OrderState::VendorNotified,
        ];
        for target in chain {
            if let Err(err) =
                self.transition(order_id, target, Actor::System, None, JsonValue::Null)
            {
                self.fail_on_submit_error(order_id, &err);
                return Err(err);
            }
        }
        Ok(self.orders.get(order_id)?)
    }

    fn fail_on_submit_error(&self, order_id: OrderId, err: &OrchestrationError) {
        let (reason, metadata) = match err {
            OrchestrationError::ValidationFailed { reason } => (
                format!("validation failed: {reason}"),
                JsonValue::Null,
            ),
            OrchestrationError::Credit(tradeflow_credit::CreditError::InsufficientCredit {
                requested,
                available,
            }) => (
                "insufficient credit".to_string(),
                json!({
                    "requested": requested,
                    "available": available,
                    "shortfall": requested - available,
                }),
            ),
            OrchestrationError::Credit(e) => (e.to_string(), JsonValue::Null),
            OrchestrationError::Routing(e) => (e.to_string(), JsonValue::Null),
            _ => (err.to_string(), JsonValue::Null),
        };
        if let Err(fail_err) = self.transition(
            order_id,
            OrderState::Failed,
            Actor::System,
            Some(reason),
            metadata,
        ) {
            warn!(order_id = %order_id, ?fail_err, "could not fail order after submit error");
        }
    }

    /// Intake for a vendor's reply to a broadcast. Acceptances race on the
    /// winner lock; rejections may close the round.
    pub fn handle_vendor_response(
        &self,
        order_id: OrderId,
        wholesaler_id: WholesalerId,
        kind: ResponseKind,
        payload: JsonValue,
    ) -> Result<ResponseOutcome, OrchestrationError> {
        let routing = self.coordinator.routing_for_order(order_id)?;
        self.coordinator
            .record_response(routing.id, wholesaler_id, kind, payload)?;

        match kind {
            ResponseKind::Accept => {
                match self.coordinator.accept(routing.id, wholesaler_id)? {
                    AcceptOutcome::Won => self.finish_acceptance(order_id, wholesaler_id, routing.id),
                    AcceptOutcome::AlreadyAccepted => Ok(ResponseOutcome::AlreadyWinner),
                    AcceptOutcome::LostRace { winner } => {
                        Ok(ResponseOutcome::LostRace { winner })
                    }
                }
            }
            ResponseKind::Reject => {
                if self.coordinator.all_declined(routing.id)? {
                    let declined = self.transition(
                        order_id,
                        OrderState::VendorRejected,
                        Actor::Wholesaler { id: wholesaler_id },
                        Some("all candidates declined".to_string()),
                        json!({ "routing_id": routing.id.to_string() }),
                    );
                    match declined {
                        Ok(_) => Ok(ResponseOutcome::AllDeclined),
                        // Retransmitted rejections land after the round
                        // already closed; absorb them instead of erroring.
                        Err(OrchestrationError::Transition(_))
                            if self.get_state(order_id)? == OrderState::VendorRejected =>
                        {
                            Ok(ResponseOutcome::AllDeclined)
                        }
                        Err(OrchestrationError::Transition(_)) => {
                            Ok(ResponseOutcome::OrderClosed)
                        }
                        Err(other) => Err(other),
                    }
                } else {
                    Ok(ResponseOutcome::RejectionRecorded)
                }
            }
            ResponseKind::Timeout | ResponseKind::Error => Ok(ResponseOutcome::Recorded),
        }
    }

    fn finish_acceptance(
        &self,
        order_id: OrderId,
        wholesaler_id: WholesalerId,
        routing_id: tradeflow_core::RoutingId,
    ) -> Result<ResponseOutcome, OrchestrationError> {
        let accepted = self.transition(
            order_id,
            OrderState::VendorAccepted,
            Actor::Wholesaler { id: wholesaler_id },
            Some("vendor accepted".to_string()),
            JsonValue::Null,
        );
        match accepted {
            Ok(_) => {
                self.coordinator.send_auto_cancellations(routing_id)?;
                Ok(ResponseOutcome::Accepted)
            }
            Err(OrchestrationError::Transition(e)) => {
                // The order closed while the acceptance was in flight. The
                // winner holds the lock but there is nothing to fulfill.
                warn!(order_id = %order_id, wholesaler_id = %wholesaler_id, %e, "acceptance won a closed order");
                self.coordinator.notify_order_closed(order_id, wholesaler_id);
                Ok(ResponseOutcome::OrderClosed)
            }
            Err(other) => Err(other),
        }
    }

    /// Mark an accepted order fulfilled: deduct stock, convert the hold.
    pub fn fulfill(&self, order_id: OrderId, actor: Actor) -> Result<Order, OrchestrationError> {
        self.transition(
            order_id,
            OrderState::Fulfilled,
            actor,
            Some("order fulfilled".to_string()),
            JsonValue::Null,
        )
    }

    /// Cancel from any non-terminal state, releasing the hold if one exists.
    pub fn cancel(
        &self,
        order_id: OrderId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Order, OrchestrationError> {
        self.transition(order_id, OrderState::Cancelled, actor, reason, JsonValue::Null)
    }

    /// Fail from any non-terminal state, releasing the hold if one exists.
    pub fn fail(
        &self,
        order_id: OrderId,
        actor: Actor,
        reason: Option<String>,
        metadata: JsonValue,
    ) -> Result<Order, OrchestrationError> {
        self.transition(order_id, OrderState::Failed, actor, reason, metadata)
    }

    // -----------------------------------------------------------------
    // Timeout sweep
    // -----------------------------------------------------------------

    /// One sweep pass: time out silent candidates, fail orders whose round
    /// passed its deadline with no winner.
    pub fn sweep(&self, now: chrono::DateTime<chrono::Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let rounds = match self.coordinator.open_rounds() {
            Ok(rounds) => rounds,
            Err(err) => {
                warn!(?err, "sweep could not list open rounds");
                return report;
            }
        };
        for routing in rounds {
            report.rounds_checked += 1;
            match self.coordinator.sweep_round(&routing, now) {
                Ok(recorded) => report.timeouts_recorded += u64::from(recorded),
                Err(err) => warn!(routing_id = %routing.id, ?err, "timeout sweep failed"),
            }
            // Re-read before failing: a lock may have landed since the
            // round was listed.
            let still_exhausted = self.coordinator.is_exhausted(&routing, now)
                && self
                    .coordinator
                    .routing_for_order(routing.order_id)
                    .map(|current| self.coordinator.is_exhausted(&current, now))
                    .unwrap_or(false);
            if still_exhausted {
                let failed = self.fail(
                    routing.order_id,
                    Actor::Sweeper,
                    Some("no vendor accepted before the routing deadline".to_string()),
                    json!({ "routing_id": routing.id.to_string() }),
                );
                match failed {
                    Ok(_) => report.orders_failed += 1,
                    // Already terminal is fine; anything else is logged.
                    Err(OrchestrationError::Transition(_)) => {}
                    Err(err) => {
                        warn!(order_id = %routing.order_id, ?err, "sweep could not fail order")
                    }
                }
            }
        }
        report
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn get_order(&self, order_id: OrderId) -> Result<Order, OrchestrationError> {
        Ok(self.orders.get(order_id)?)
    }

    pub fn get_state(&self, order_id: OrderId) -> Result<OrderState, OrchestrationError> {
        Ok(self.orders.get(order_id)?.state)
    }

    /// Legal next states for the order as it stands.
    pub fn allowed_transitions(
        &self,
        order_id: OrderId,
    ) -> Result<&'static [OrderState], OrchestrationError> {
        Ok(self.orders.get(order_id)?.state.allowed_transitions())
    }

    pub fn history(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<TransitionRecord>, OrchestrationError> {
        Ok(self.orders.history(order_id)?)
    }

    pub fn routing_status(&self, order_id: OrderId) -> Result<RoutingStatus, OrchestrationError> {
        self.coordinator.status(order_id)
    }
}

fn merge_metadata(base: JsonValue, extra: JsonValue) -> JsonValue {
    match (base, extra) {
        (JsonValue::Null, extra) => extra,
        (base, JsonValue::Null) => base,
        (JsonValue::Object(mut base), JsonValue::Object(extra)) => {
            base.extend(extra);
            JsonValue::Object(base)
        }
        (base, _) => base,
    }
}
