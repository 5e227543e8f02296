//! Throughput benchmarks for the hot orchestration paths.

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use tradeflow_core::{OrderId, ProductId, RetailerId, RetryPolicy, WholesalerId};
use tradeflow_credit::{AccountKey, CreditAccount};
use tradeflow_events::{InMemoryEventBus, TransitionEvent};
use tradeflow_orders::OrderLine;
use tradeflow_routing::{AvailabilityBand, VendorProfile};

use tradeflow_infra::{
    ApproveAll, CandidateSelector, CreditEngine, CreditStore, InMemoryCreditStore,
    InMemoryInventory, InMemoryOrderStore, InMemoryRoutingStore, OrderStateMachine,
    RecordingMessenger, RoutingConfig, RoutingCoordinator,
};
use tradeflow_infra::{InventoryPort, MessagingPort, StaticDirectory};

fn bench_reserve_release(c: &mut Criterion) {
    let key = AccountKey::new(RetailerId::new(), WholesalerId::new());
    let store = Arc::new(InMemoryCreditStore::new());
    store
        .upsert_account(CreditAccount::new(key, i64::MAX / 2))
        .unwrap();
    let engine = CreditEngine::new(
        Arc::clone(&store) as Arc<dyn CreditStore>,
        RetryPolicy::default(),
    );

    c.bench_function("credit_reserve_release_cycle", |b| {
        b.iter(|| {
            let order_id = OrderId::new();
            engine.reserve(key, order_id, 10_000).unwrap();
            engine.release(order_id).unwrap();
        })
    });
}

fn machine() -> (
    Arc<OrderStateMachine<Arc<InMemoryEventBus<TransitionEvent>>>>,
    RetailerId,
    WholesalerId,
) {
    let retailer = RetailerId::new();
    let credit_wholesaler = WholesalerId::new();
    let vendor = WholesalerId::new();

    let credit_store = Arc::new(InMemoryCreditStore::new());
    credit_store
        .upsert_account(CreditAccount::new(
            AccountKey::new(retailer, credit_wholesaler),
            i64::MAX / 2,
        ))
        .unwrap();

    let profiles = vec![VendorProfile {
        wholesaler_id: vendor,
        active: true,
        availability: AvailabilityBand::InStock,
        distance_km: 3.0,
        delivery_radius_km: 50.0,
        reliability: 90.0,
        quoted_price: 10_000,
        utilization: 0.3,
    }];

    let inventory = Arc::new(InMemoryInventory::new());
    let machine = Arc::new(OrderStateMachine::new(
        Arc::new(InMemoryOrderStore::new()),
        CreditEngine::new(credit_store as Arc<dyn CreditStore>, RetryPolicy::default()),
        RoutingCoordinator::new(
            Arc::new(InMemoryRoutingStore::new()),
            Arc::new(RecordingMessenger::new()) as Arc<dyn MessagingPort>,
            RoutingConfig::default(),
        ),
        CandidateSelector::new(
            Arc::new(StaticDirectory::new(profiles)),
            Arc::clone(&inventory) as Arc<dyn InventoryPort>,
        ),
        inventory as Arc<dyn InventoryPort>,
        Arc::new(ApproveAll),
        Arc::new(InMemoryEventBus::new()),
    ));
    (machine, retailer, credit_wholesaler)
}

fn bench_submit_pipeline(c: &mut Criterion) {
    let (machine, retailer, credit_wholesaler) = machine();

    c.bench_function("submit_to_vendor_notified", |b| {
        b.iter(|| {
            let order = machine
                .create_order(
                    retailer,
                    credit_wholesaler,
                    vec![OrderLine {
                        line_no: 1,
                        product_id: ProductId::new(),
                        quantity: 1,
                        unit_price: 10_000,
                    }],
                )
                .unwrap();
            machine.submit(order.id).unwrap();
        })
    });
}

criterion_group!(benches, bench_reserve_release, bench_submit_pipeline);
criterion_main!(benches);
