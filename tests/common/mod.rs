//! Shared harness wiring the engine against in-memory backends.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use ordersync::config::SyncConfig;
use ordersync::errors::ServiceError;
use ordersync::models::{
    DocumentType, Notification, Order, OrderItem, OrderStatus, PaymentStatus,
};
use ordersync::services::notifications::{NotificationFanout, NotificationRpc};
use ordersync::services::resolution::ResolutionChain;
use ordersync::store::{OrderStore, ProjectionSource};
use ordersync::tiers::memory::{
    InMemoryCanonicalTier, InMemoryLegacyTier, InMemoryProjection, InMemorySupplierPartTier,
};
use ordersync::tiers::TierResolver;

/// Records every delivered notification for assertions.
#[derive(Default)]
pub struct RecordingRpc {
    pub delivered: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationRpc for RecordingRpc {
    async fn deliver(&self, notification: Notification) -> Result<(), ServiceError> {
        self.delivered.lock().unwrap().push(notification);
        Ok(())
    }
}

pub struct TestEnv {
    pub parts: Arc<InMemorySupplierPartTier>,
    pub canonical: Arc<InMemoryCanonicalTier>,
    pub legacy: Arc<InMemoryLegacyTier>,
    pub chain: Arc<ResolutionChain>,
    pub projection: Arc<InMemoryProjection>,
    pub store: Arc<OrderStore>,
    pub rpc: Arc<RecordingRpc>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        init_tracing();
        let parts = Arc::new(InMemorySupplierPartTier::new());
        let canonical = Arc::new(InMemoryCanonicalTier::new());
        let legacy = Arc::new(InMemoryLegacyTier::new());
        let chain = Arc::new(ResolutionChain::new(
            Arc::clone(&parts) as Arc<dyn TierResolver>,
            Arc::clone(&canonical) as Arc<dyn TierResolver>,
            Arc::clone(&legacy) as Arc<dyn TierResolver>,
        ));
        let projection = Arc::new(InMemoryProjection::new(
            Arc::clone(&canonical),
            Arc::clone(&legacy),
        ));
        let rpc = Arc::new(RecordingRpc::default());
        let fanout = Arc::new(NotificationFanout::new(
            Arc::clone(&rpc) as Arc<dyn NotificationRpc>
        ));
        let store = Arc::new(OrderStore::new(
            config,
            Arc::clone(&chain),
            fanout,
            Arc::clone(&projection) as Arc<dyn ProjectionSource>,
        ));
        Self {
            parts,
            canonical,
            legacy,
            chain,
            projection,
            store,
            rpc,
        }
    }
}

pub fn item(supplier: Uuid, unit_price: rust_decimal::Decimal, quantity: u32) -> OrderItem {
    OrderItem {
        product_id: Uuid::new_v4(),
        quantity,
        unit_price,
        financing_amount: None,
        document_type: DocumentType::Boleta,
        supplier_id: Some(supplier),
        product: None,
        is_offered: false,
        offer_id: None,
        offered_price: None,
    }
}

pub fn paid_order(items: Vec<OrderItem>) -> Order {
    order_with(OrderStatus::Pending, Some(PaymentStatus::Paid), items)
}

pub fn order_with(
    status: OrderStatus,
    payment: Option<PaymentStatus>,
    items: Vec<OrderItem>,
) -> Order {
    let subtotal = items.iter().map(OrderItem::line_subtotal).sum();
    Order {
        id: Uuid::new_v4(),
        buyer_id: Uuid::new_v4(),
        status,
        payment_status: payment,
        items,
        subtotal,
        shipping_amount: dec!(100),
        payment_method: Some("transferencia".into()),
        payment_rejection_reason: None,
        estimated_delivery_date: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
