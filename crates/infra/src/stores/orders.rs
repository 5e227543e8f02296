//! Order persistence: the order rows plus the append-only transition log.
//!
//! `set_state` and `append_transition` are called by the state machine
//! service while it holds the per-order section, so per-order log timestamps
//! stay monotonic.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use tradeflow_core::{OrderId, WholesalerId};
use tradeflow_orders::{Order, OrderState, TransitionError, TransitionRecord};

use crate::error::OrchestrationError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderStoreError {
    #[error("order not found")]
    NotFound,

    #[error("order already exists")]
    Duplicate,

    /// `wholesaler_id` is write-once; a second assignment is a caller bug.
    #[error("order already assigned to wholesaler {assigned}")]
    AlreadyAssigned { assigned: WholesalerId },

    #[error("order storage failure: {0}")]
    Internal(String),
}

impl From<OrderStoreError> for OrchestrationError {
    fn from(err: OrderStoreError) -> Self {
        match err {
            OrderStoreError::NotFound => OrchestrationError::Transition(TransitionError::NotFound),
            other => OrchestrationError::Store(other.to_string()),
        }
    }
}

/// Order row + transition log storage.
pub trait OrderStore: Send + Sync {
    fn insert(&self, order: Order) -> Result<(), OrderStoreError>;

    fn get(&self, order_id: OrderId) -> Result<Order, OrderStoreError>;

    /// Overwrite the state column and bump `updated_at`. Legality is the
    /// state machine service's responsibility; the store just writes.
    fn set_state(&self, order_id: OrderId, state: OrderState) -> Result<Order, OrderStoreError>;

    /// Write-once fulfillment assignment, set when an acceptance wins.
    fn assign_wholesaler(
        &self,
        order_id: OrderId,
        wholesaler_id: WholesalerId,
    ) -> Result<Order, OrderStoreError>;

    fn append_transition(&self, record: TransitionRecord) -> Result<(), OrderStoreError>;

    /// Full transition history for one order, in append order.
    fn history(&self, order_id: OrderId) -> Result<Vec<TransitionRecord>, OrderStoreError>;
}

/// In-memory order store. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    log: RwLock<HashMap<OrderId, Vec<TransitionRecord>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(_: impl core::fmt::Debug) -> OrderStoreError {
    OrderStoreError::Internal("lock poisoned".to_string())
}

impl OrderStore for InMemoryOrderStore {
    fn insert(&self, order: Order) -> Result<(), OrderStoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if orders.contains_key(&order.id) {
            return Err(OrderStoreError::Duplicate);
        }
        orders.insert(order.id, order);
        Ok(())
    }

    fn get(&self, order_id: OrderId) -> Result<Order, OrderStoreError> {
        self.orders
            .read()
            .map_err(poisoned)?
            .get(&order_id)
            .cloned()
            .ok_or(OrderStoreError::NotFound)
    }

    fn set_state(&self, order_id: OrderId, state: OrderState) -> Result<Order, OrderStoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders.get_mut(&order_id).ok_or(OrderStoreError::NotFound)?;
        order.state = state;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    fn assign_wholesaler(
        &self,
        order_id: OrderId,
        wholesaler_id: WholesalerId,
    ) -> Result<Order, OrderStoreError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders.get_mut(&order_id).ok_or(OrderStoreError::NotFound)?;
        match order.wholesaler_id {
            Some(assigned) if assigned != wholesaler_id => {
                Err(OrderStoreError::AlreadyAssigned { assigned })
            }
            _ => {
                order.wholesaler_id = Some(wholesaler_id);
                order.updated_at = Utc::now();
                Ok(order.clone())
            }
        }
    }

    fn append_transition(&self, record: TransitionRecord) -> Result<(), OrderStoreError> {
        self.log
            .write()
            .map_err(poisoned)?
            .entry(record.order_id)
            .or_default()
            .push(record);
        Ok(())
    }

    fn history(&self, order_id: OrderId) -> Result<Vec<TransitionRecord>, OrderStoreError> {
        Ok(self
            .log
            .read()
            .map_err(poisoned)?
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }
}
