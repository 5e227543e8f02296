//! Routing persistence: routing rounds, vendor responses, cancellations.
//!
//! The winner lock is the store's one hard guarantee: `try_lock_winner` is a
//! single conditional update under the write lock, so N concurrent
//! acceptances produce exactly one `Won` and the rest observe the winner.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use tradeflow_core::{OrderId, RoutingId, WholesalerId};
use tradeflow_routing::{RoutingError, VendorCancellation, VendorResponse, VendorRouting};

use crate::error::OrchestrationError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingStoreError {
    #[error(transparent)]
    Domain(#[from] RoutingError),

    #[error("routing storage failure: {0}")]
    Internal(String),
}

impl From<RoutingStoreError> for OrchestrationError {
    fn from(err: RoutingStoreError) -> Self {
        match err {
            RoutingStoreError::Domain(e) => OrchestrationError::Routing(e),
            other => OrchestrationError::Store(other.to_string()),
        }
    }
}

/// Result of one atomic winner-lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// This acceptance took the lock.
    Won,
    /// The caller already holds the lock (duplicate acceptance).
    AlreadyLockedBySelf,
    /// Another wholesaler won first.
    AlreadyLockedByOther(WholesalerId),
}

/// Routing round storage. One active round per order.
pub trait RoutingStore: Send + Sync {
    fn create(&self, routing: VendorRouting) -> Result<(), RoutingStoreError>;

    /// Replace the order's active round with a new one (re-broadcast). The
    /// superseded round stays readable by id.
    fn supersede(&self, routing: VendorRouting) -> Result<(), RoutingStoreError>;

    fn get(&self, routing_id: RoutingId) -> Result<VendorRouting, RoutingStoreError>;

    /// The order's active routing round.
    fn find_by_order(&self, order_id: OrderId) -> Result<VendorRouting, RoutingStoreError>;

    /// Record a vendor response. Unique per (routing, wholesaler): returns
    /// `false` when that pair already responded (repeat is idempotent).
    fn record_response(&self, response: VendorResponse) -> Result<bool, RoutingStoreError>;

    /// Atomic conditional update of the winner column.
    fn try_lock_winner(
        &self,
        routing_id: RoutingId,
        wholesaler_id: WholesalerId,
    ) -> Result<LockOutcome, RoutingStoreError>;

    fn responses(&self, routing_id: RoutingId) -> Result<Vec<VendorResponse>, RoutingStoreError>;

    /// Record a loser cancellation notice. Unique per (routing, wholesaler);
    /// returns `false` on repeats.
    fn record_cancellation(
        &self,
        cancellation: VendorCancellation,
    ) -> Result<bool, RoutingStoreError>;

    fn cancellations(
        &self,
        routing_id: RoutingId,
    ) -> Result<Vec<VendorCancellation>, RoutingStoreError>;

    /// Active rounds with no locked winner yet (sweeper input).
    fn list_open(&self) -> Result<Vec<VendorRouting>, RoutingStoreError>;
}

#[derive(Debug, Default)]
struct RoutingState {
    routings: HashMap<RoutingId, VendorRouting>,
    by_order: HashMap<OrderId, RoutingId>,
    responses: HashMap<(RoutingId, WholesalerId), VendorResponse>,
    cancellations: HashMap<(RoutingId, WholesalerId), VendorCancellation>,
}

/// In-memory routing store. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRoutingStore {
    state: RwLock<RoutingState>,
}

fn poisoned(_: impl core::fmt::Debug) -> RoutingStoreError {
    RoutingStoreError::Internal("lock poisoned".to_string())
}

impl InMemoryRoutingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoutingStore for InMemoryRoutingStore {
    fn create(&self, routing: VendorRouting) -> Result<(), RoutingStoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.by_order.contains_key(&routing.order_id) {
            return Err(RoutingError::DuplicateRouting.into());
        }
        state.by_order.insert(routing.order_id, routing.id);
        state.routings.insert(routing.id, routing);
        Ok(())
    }

    fn supersede(&self, routing: VendorRouting) -> Result<(), RoutingStoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.by_order.insert(routing.order_id, routing.id);
        state.routings.insert(routing.id, routing);
        Ok(())
    }

    fn get(&self, routing_id: RoutingId) -> Result<VendorRouting, RoutingStoreError> {
        self.state
            .read()
            .map_err(poisoned)?
            .routings
            .get(&routing_id)
            .cloned()
            .ok_or(RoutingError::NotFound.into())
    }

    fn find_by_order(&self, order_id: OrderId) -> Result<VendorRouting, RoutingStoreError> {
        let state = self.state.read().map_err(poisoned)?;
        state
            .by_order
            .get(&order_id)
            .and_then(|id| state.routings.get(id))
            .cloned()
            .ok_or(RoutingError::NotFound.into())
    }

    fn record_response(&self, response: VendorResponse) -> Result<bool, RoutingStoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let routing = state
            .routings
            .get(&response.routing_id)
            .ok_or(RoutingError::NotFound)?;
        if !routing.is_candidate(response.wholesaler_id) {
            return Err(RoutingError::NotACandidate {
                wholesaler_id: response.wholesaler_id,
            }
            .into());
        }
        let key = (response.routing_id, response.wholesaler_id);
        if state.responses.contains_key(&key) {
            return Ok(false);
        }
        let routing_id = response.routing_id;
        state.responses.insert(key, response);
        if let Some(routing) = state.routings.get_mut(&routing_id) {
            routing.version += 1;
        }
        Ok(true)
    }

    fn try_lock_winner(
        &self,
        routing_id: RoutingId,
        wholesaler_id: WholesalerId,
    ) -> Result<LockOutcome, RoutingStoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let routing = state
            .routings
            .get_mut(&routing_id)
            .ok_or(RoutingError::NotFound)?;
        if !routing.is_candidate(wholesaler_id) {
            return Err(RoutingError::NotACandidate { wholesaler_id }.into());
        }
        match routing.locked_wholesaler_id {
            Some(winner) if winner == wholesaler_id => Ok(LockOutcome::AlreadyLockedBySelf),
            Some(winner) => Ok(LockOutcome::AlreadyLockedByOther(winner)),
            None => {
                // Late acceptances cannot take an exhausted round; checked
                // inside the same atomic section as the lock write.
                let now = Utc::now();
                if now > routing.deadline {
                    return Err(RoutingError::RoutingExhausted {
                        order_id: routing.order_id,
                    }
                    .into());
                }
                routing.locked_wholesaler_id = Some(wholesaler_id);
                routing.locked_at = Some(now);
                routing.version += 1;
                Ok(LockOutcome::Won)
            }
        }
    }

    fn responses(&self, routing_id: RoutingId) -> Result<Vec<VendorResponse>, RoutingStoreError> {
        let state = self.state.read().map_err(poisoned)?;
        let mut responses: Vec<VendorResponse> = state
            .responses
            .values()
            .filter(|r| r.routing_id == routing_id)
            .cloned()
            .collect();
        responses.sort_by_key(|r| r.occurred_at);
        Ok(responses)
    }

    fn record_cancellation(
        &self,
        cancellation: VendorCancellation,
    ) -> Result<bool, RoutingStoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let key = (cancellation.routing_id, cancellation.wholesaler_id);
        if state.cancellations.contains_key(&key) {
            return Ok(false);
        }
        state.cancellations.insert(key, cancellation);
        Ok(true)
    }

    fn cancellations(
        &self,
        routing_id: RoutingId,
    ) -> Result<Vec<VendorCancellation>, RoutingStoreError> {
        let state = self.state.read().map_err(poisoned)?;
        let mut rows: Vec<VendorCancellation> = state
            .cancellations
            .values()
            .filter(|c| c.routing_id == routing_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.created_at);
        Ok(rows)
    }

    fn list_open(&self) -> Result<Vec<VendorRouting>, RoutingStoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .by_order
            .values()
            .filter_map(|id| state.routings.get(id))
            .filter(|r| !r.is_locked())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;
    use tradeflow_routing::{Candidate, ResponseKind};

    fn candidate(wholesaler_id: WholesalerId) -> Candidate {
        Candidate {
            wholesaler_id,
            score: 80.0,
            quoted_price: 10_000,
            reliability: 90.0,
        }
    }

    fn routing_with(candidates: &[WholesalerId]) -> VendorRouting {
        VendorRouting::new(
            OrderId::new(),
            candidates.iter().map(|w| candidate(*w)).collect(),
            Utc::now() + chrono::Duration::minutes(30),
        )
    }

    #[test]
    fn one_active_round_per_order() {
        let store = InMemoryRoutingStore::new();
        let routing = routing_with(&[WholesalerId::new()]);
        let duplicate = VendorRouting::new(
            routing.order_id,
            routing.candidates.clone(),
            routing.deadline,
        );
        store.create(routing).unwrap();
        let err = store.create(duplicate).unwrap_err();
        assert_eq!(err, RoutingStoreError::Domain(RoutingError::DuplicateRouting));
    }

    #[test]
    fn first_lock_wins_and_later_attempts_see_the_winner() {
        let store = InMemoryRoutingStore::new();
        let (a, b) = (WholesalerId::new(), WholesalerId::new());
        let routing = routing_with(&[a, b]);
        let routing_id = routing.id;
        store.create(routing).unwrap();

        assert_eq!(store.try_lock_winner(routing_id, a).unwrap(), LockOutcome::Won);
        assert_eq!(
            store.try_lock_winner(routing_id, b).unwrap(),
            LockOutcome::AlreadyLockedByOther(a)
        );
        assert_eq!(
            store.try_lock_winner(routing_id, a).unwrap(),
            LockOutcome::AlreadyLockedBySelf
        );

        let stored = store.get(routing_id).unwrap();
        assert_eq!(stored.locked_wholesaler_id, Some(a));
        assert!(stored.locked_at.is_some());
    }

    #[test]
    fn acceptances_past_the_deadline_cannot_lock() {
        let store = InMemoryRoutingStore::new();
        let vendor = WholesalerId::new();
        let routing = VendorRouting::new(
            OrderId::new(),
            vec![candidate(vendor)],
            Utc::now() - chrono::Duration::seconds(1),
        );
        let routing_id = routing.id;
        let order_id = routing.order_id;
        store.create(routing).unwrap();

        let err = store.try_lock_winner(routing_id, vendor).unwrap_err();
        assert_eq!(
            err,
            RoutingStoreError::Domain(RoutingError::RoutingExhausted { order_id })
        );
        assert!(!store.get(routing_id).unwrap().is_locked());
    }

    #[test]
    fn non_candidates_cannot_lock_or_respond() {
        let store = InMemoryRoutingStore::new();
        let routing = routing_with(&[WholesalerId::new()]);
        let routing_id = routing.id;
        store.create(routing).unwrap();

        let outsider = WholesalerId::new();
        let err = store.try_lock_winner(routing_id, outsider).unwrap_err();
        assert_eq!(
            err,
            RoutingStoreError::Domain(RoutingError::NotACandidate {
                wholesaler_id: outsider,
            })
        );
    }

    #[test]
    fn repeat_responses_are_idempotent() {
        let store = InMemoryRoutingStore::new();
        let vendor = WholesalerId::new();
        let routing = routing_with(&[vendor]);
        let routing_id = routing.id;
        store.create(routing).unwrap();

        let response =
            VendorResponse::new(routing_id, vendor, ResponseKind::Reject, 120, JsonValue::Null);
        assert!(store.record_response(response.clone()).unwrap());
        assert!(!store.record_response(response).unwrap());
        assert_eq!(store.responses(routing_id).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_acceptances_produce_exactly_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryRoutingStore::new());
        let vendors: Vec<WholesalerId> = (0..10).map(|_| WholesalerId::new()).collect();
        let routing = routing_with(&vendors);
        let routing_id = routing.id;
        store.create(routing).unwrap();

        let handles: Vec<_> = vendors
            .iter()
            .map(|vendor| {
                let store = Arc::clone(&store);
                let vendor = *vendor;
                std::thread::spawn(move || store.try_lock_winner(routing_id, vendor).unwrap())
            })
            .collect();

        let outcomes: Vec<LockOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = outcomes
            .iter()
            .filter(|o| matches!(o, LockOutcome::Won))
            .count();
        assert_eq!(wins, 1);

        let winner = store.get(routing_id).unwrap().locked_wholesaler_id.unwrap();
        for outcome in outcomes {
            match outcome {
                LockOutcome::Won => {}
                LockOutcome::AlreadyLockedByOther(observed) => assert_eq!(observed, winner),
                LockOutcome::AlreadyLockedBySelf => panic!("no duplicate acceptances were sent"),
            }
        }
    }

    #[test]
    fn open_rounds_exclude_locked_ones() {
        let store = InMemoryRoutingStore::new();
        let vendor = WholesalerId::new();
        let open = routing_with(&[vendor]);
        let locked = routing_with(&[vendor]);
        let locked_id = locked.id;
        store.create(open).unwrap();
        store.create(locked).unwrap();
        store.try_lock_winner(locked_id, vendor).unwrap();

        let open_rounds = store.list_open().unwrap();
        assert_eq!(open_rounds.len(), 1);
        assert!(!open_rounds[0].is_locked());
    }

    #[test]
    fn supersede_swaps_the_active_round() {
        let store = InMemoryRoutingStore::new();
        let vendor = WholesalerId::new();
        let first = routing_with(&[vendor]);
        let order_id = first.order_id;
        let first_id = first.id;
        store.create(first).unwrap();

        let second = VendorRouting::new(
            order_id,
            vec![candidate(WholesalerId::new())],
            Utc::now() + chrono::Duration::minutes(30),
        );
        let second_id = second.id;
        store.supersede(second).unwrap();

        assert_eq!(store.find_by_order(order_id).unwrap().id, second_id);
        // The old round stays readable for audit.
        assert!(store.get(first_id).is_ok());
    }
}
