//! External collaborator ports.
//!
//! The core consumes these services but does not own them: messaging for
//! vendor notices, inventory for availability/stock movements, the opaque
//! order-validation predicate, and the vendor directory supplying scoring
//! inputs (including externally computed distance). Each trait ships with an
//! in-memory implementation used by tests and default wiring.

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::Value as JsonValue;

use tradeflow_core::WholesalerId;
use tradeflow_orders::{Order, OrderLine};
use tradeflow_routing::{AvailabilityBand, VendorProfile};

/// Outbound vendor notifications. Failures are logged by callers and never
/// affect a committed lock or reservation decision.
pub trait MessagingPort: Send + Sync {
    fn notify(&self, recipient: WholesalerId, template: &str, payload: &JsonValue)
    -> anyhow::Result<()>;
}

/// Stock operations owned by the external inventory service.
pub trait InventoryPort: Send + Sync {
    fn check_availability(&self, wholesaler: WholesalerId, lines: &[OrderLine])
    -> AvailabilityBand;

    /// Deduct stock at fulfillment. Failure aborts the FULFILLED transition
    /// before any ledger write happens.
    fn deduct(&self, wholesaler: WholesalerId, lines: &[OrderLine]) -> anyhow::Result<()>;
}

/// Opaque external pass/fail predicate gating CREATED→VALIDATED.
pub trait OrderValidator: Send + Sync {
    fn validate(&self, order: &Order) -> Result<(), String>;
}

/// Supplies per-order vendor scoring inputs.
pub trait VendorDirectory: Send + Sync {
    fn vendors_for(&self, order: &Order) -> Vec<VendorProfile>;
}

// ---------------------------------------------------------------------------
// In-memory implementations (tests/dev wiring)
// ---------------------------------------------------------------------------

/// A notice captured by [`RecordingMessenger`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotice {
    pub recipient: WholesalerId,
    pub template: String,
    pub payload: JsonValue,
}

/// Records every notice; can be told to fail for specific recipients to
/// exercise best-effort paths.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentNotice>>,
    failing: Mutex<HashSet<WholesalerId>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, recipient: WholesalerId) {
        self.failing.lock().unwrap().insert(recipient);
    }

    pub fn sent(&self) -> Vec<SentNotice> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient: WholesalerId) -> Vec<SentNotice> {
        self.sent()
            .into_iter()
            .filter(|n| n.recipient == recipient)
            .collect()
    }
}

impl MessagingPort for RecordingMessenger {
    fn notify(
        &self,
        recipient: WholesalerId,
        template: &str,
        payload: &JsonValue,
    ) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(&recipient) {
            anyhow::bail!("simulated delivery failure to {recipient}");
        }
        self.sent.lock().unwrap().push(SentNotice {
            recipient,
            template: template.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }
}

/// Inventory stub: everything in stock, deductions recorded.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    deductions: Mutex<Vec<(WholesalerId, Vec<OrderLine>)>>,
    failing: Mutex<HashSet<WholesalerId>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, wholesaler: WholesalerId) {
        self.failing.lock().unwrap().insert(wholesaler);
    }

    pub fn deductions(&self) -> Vec<(WholesalerId, Vec<OrderLine>)> {
        self.deductions.lock().unwrap().clone()
    }
}

impl InventoryPort for InMemoryInventory {
    fn check_availability(
        &self,
        _wholesaler: WholesalerId,
        _lines: &[OrderLine],
    ) -> AvailabilityBand {
        AvailabilityBand::InStock
    }

    fn deduct(&self, wholesaler: WholesalerId, lines: &[OrderLine]) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(&wholesaler) {
            anyhow::bail!("simulated stock deduction failure for {wholesaler}");
        }
        self.deductions
            .lock()
            .unwrap()
            .push((wholesaler, lines.to_vec()));
        Ok(())
    }
}

/// Validator that approves everything.
#[derive(Debug, Default)]
pub struct ApproveAll;

impl OrderValidator for ApproveAll {
    fn validate(&self, _order: &Order) -> Result<(), String> {
        Ok(())
    }
}

/// Validator that rejects everything with a fixed reason.
#[derive(Debug)]
pub struct RejectAll(pub String);

impl OrderValidator for RejectAll {
    fn validate(&self, _order: &Order) -> Result<(), String> {
        Err(self.0.clone())
    }
}

/// A fixed candidate universe, returned for every order.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    profiles: Vec<VendorProfile>,
}

impl StaticDirectory {
    pub fn new(profiles: Vec<VendorProfile>) -> Self {
        Self { profiles }
    }
}

impl VendorDirectory for StaticDirectory {
    fn vendors_for(&self, _order: &Order) -> Vec<VendorProfile> {
        self.profiles.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recording_messenger_captures_notices() {
        let messenger = RecordingMessenger::new();
        let vendor = WholesalerId::new();
        messenger
            .notify(vendor, "vendor_broadcast", &json!({"order": 1}))
            .unwrap();
        let sent = messenger.sent_to(vendor);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template, "vendor_broadcast");
    }

    #[test]
    fn recording_messenger_can_simulate_failures() {
        let messenger = RecordingMessenger::new();
        let vendor = WholesalerId::new();
        messenger.fail_for(vendor);
        assert!(
            messenger
                .notify(vendor, "vendor_broadcast", &JsonValue::Null)
                .is_err()
        );
        assert!(messenger.sent().is_empty());
    }
}
