//! Candidate selection: directory profiles plus live availability in,
//! ranked candidates out.

use std::sync::Arc;

use tracing::debug;

use tradeflow_core::WholesalerId;
use tradeflow_orders::Order;
use tradeflow_routing::{Candidate, RoutingError, score_candidates};

use crate::ports::{InventoryPort, VendorDirectory};

pub struct CandidateSelector {
    directory: Arc<dyn VendorDirectory>,
    inventory: Arc<dyn InventoryPort>,
}

impl CandidateSelector {
    pub fn new(directory: Arc<dyn VendorDirectory>, inventory: Arc<dyn InventoryPort>) -> Self {
        Self {
            directory,
            inventory,
        }
    }

    /// Rank the eligible vendors for this order, best first. Availability
    /// comes from the inventory service at selection time; the directory
    /// supplies the slower-moving profile fields.
    pub fn select(&self, order: &Order) -> Result<Vec<Candidate>, RoutingError> {
        self.select_excluding(order, &[])
    }

    /// Rank eligible vendors, leaving out `excluded` (re-broadcast after a
    /// winner backed out).
    pub fn select_excluding(
        &self,
        order: &Order,
        excluded: &[WholesalerId],
    ) -> Result<Vec<Candidate>, RoutingError> {
        let mut profiles = self.directory.vendors_for(order);
        for profile in &mut profiles {
            profile.availability = self
                .inventory
                .check_availability(profile.wholesaler_id, &order.lines);
        }
        let mut candidates = score_candidates(&profiles);
        candidates.retain(|c| !excluded.contains(&c.wholesaler_id));
        if candidates.is_empty() {
            return Err(RoutingError::NoCandidates { order_id: order.id });
        }
        debug!(
            order_id = %order.id,
            candidates = candidates.len(),
            top_score = candidates[0].score,
            "candidates ranked"
        );
        Ok(candidates)
    }
}
