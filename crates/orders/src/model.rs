//! Order model. Orders are created once, mutated only by the state machine
//! service, and never deleted (retained indefinitely for audit).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradeflow_core::{OrderId, ProductId, RetailerId, WholesalerId};

use crate::state::OrderState;

/// Order line: product, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: i64,
}

impl OrderLine {
    pub fn amount(&self) -> i64 {
        self.quantity.saturating_mul(self.unit_price)
    }
}

/// A retailer's order, possibly assigned to a wholesaler once routing locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub retailer_id: RetailerId,
    /// The wholesaler whose credit line funds this order, fixed at
    /// placement. Credit is reserved against (retailer, credit_wholesaler)
    /// before routing runs, so it cannot depend on the routing outcome.
    pub credit_wholesaler_id: WholesalerId,
    /// Write-once: set when a vendor's acceptance wins the routing race.
    pub wholesaler_id: Option<WholesalerId>,
    pub lines: Vec<OrderLine>,
    /// Total in smallest currency unit; the amount reserved against credit.
    pub total_amount: i64,
    pub state: OrderState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new order in `Created`. Lines must be non-empty with positive
    /// quantities and prices; the total is derived, never caller-supplied.
    pub fn new(
        retailer_id: RetailerId,
        credit_wholesaler_id: WholesalerId,
        lines: Vec<OrderLine>,
    ) -> Result<Self, OrderBuildError> {
        if lines.is_empty() {
            return Err(OrderBuildError::NoLines);
        }
        for line in &lines {
            if line.quantity <= 0 {
                return Err(OrderBuildError::NonPositiveQuantity { line_no: line.line_no });
            }
            if line.unit_price <= 0 {
                return Err(OrderBuildError::NonPositivePrice { line_no: line.line_no });
            }
        }
        let total_amount = lines.iter().map(OrderLine::amount).sum();
        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            retailer_id,
            credit_wholesaler_id,
            wholesaler_id: None,
            lines,
            total_amount,
            state: OrderState::Created,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Validation failures when constructing an order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderBuildError {
    #[error("order must have at least one line")]
    NoLines,

    #[error("line {line_no}: quantity must be positive")]
    NonPositiveQuantity { line_no: u32 },

    #[error("line {line_no}: unit price must be positive")]
    NonPositivePrice { line_no: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(line_no: u32, quantity: i64, unit_price: i64) -> OrderLine {
        OrderLine {
            line_no,
            product_id: ProductId::new(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn total_is_derived_from_lines() {
        let order = Order::new(
            RetailerId::new(),
            WholesalerId::new(),
            vec![line(1, 3, 1_000), line(2, 2, 250)],
        )
        .unwrap();
        assert_eq!(order.total_amount, 3_500);
        assert_eq!(order.state, OrderState::Created);
        assert!(order.wholesaler_id.is_none());
    }

    #[test]
    fn empty_orders_are_rejected() {
        let err = Order::new(RetailerId::new(), WholesalerId::new(), vec![]).unwrap_err();
        assert_eq!(err, OrderBuildError::NoLines);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let err =
            Order::new(RetailerId::new(), WholesalerId::new(), vec![line(1, 0, 100)]).unwrap_err();
        assert_eq!(err, OrderBuildError::NonPositiveQuantity { line_no: 1 });

        let err =
            Order::new(RetailerId::new(), WholesalerId::new(), vec![line(1, 1, 0)]).unwrap_err();
        assert_eq!(err, OrderBuildError::NonPositivePrice { line_no: 1 });
    }
}
