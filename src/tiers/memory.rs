//! In-memory tier implementations.
//!
//! Back the integration tests and local wiring; each mirrors the schema
//! quirks of the relational resource it stands in for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Order, SupplierPart};
use crate::store::ProjectionSource;

use super::{StatusSnapshot, StatusUpdate, TierResolver, TierSource, WriteAttempt};

/// Canonical payment-order tier: schema-complete.
#[derive(Default)]
pub struct InMemoryCanonicalTier {
    rows: RwLock<HashMap<Uuid, Order>>,
    update_calls: AtomicU64,
}

impl InMemoryCanonicalTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.rows.write().expect("canonical tier lock").insert(order.id, order);
    }

    pub fn get(&self, order_id: Uuid) -> Option<Order> {
        self.rows.read().expect("canonical tier lock").get(&order_id).cloned()
    }

    /// Number of write attempts that reached this tier.
    pub fn update_call_count(&self) -> u64 {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TierResolver for InMemoryCanonicalTier {
    fn source(&self) -> TierSource {
        TierSource::CanonicalOrders
    }

    async fn current_status(
        &self,
        order_id: Uuid,
    ) -> Result<Option<StatusSnapshot>, ServiceError> {
        Ok(self
            .rows
            .read()
            .expect("canonical tier lock")
            .get(&order_id)
            .map(|o| StatusSnapshot {
                status: o.status,
                payment_status: o.payment_status,
            }))
    }

    async fn apply_update(
        &self,
        order_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<WriteAttempt, ServiceError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().expect("canonical tier lock");
        let Some(order) = rows.get_mut(&order_id) else {
            return Ok(WriteAttempt::NotFound);
        };
        order.status = update.new_status;
        if let Some(estimate) = update.estimated_delivery_date {
            order.estimated_delivery_date = Some(estimate);
        }
        if let Some(reason) = &update.rejection_reason {
            order.payment_rejection_reason = Some(reason.clone());
        }
        order.updated_at = Some(Utc::now());
        Ok(WriteAttempt::Applied(order.clone()))
    }
}

/// Legacy cart-derived tier. Predates the payment flow: rows carry no
/// payment status and the schema has no `estimated_delivery_date` column.
#[derive(Default)]
pub struct InMemoryLegacyTier {
    rows: RwLock<HashMap<Uuid, Order>>,
    update_calls: AtomicU64,
}

impl InMemoryLegacyTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row, normalizing away the fields the legacy schema lacks.
    pub fn insert(&self, mut order: Order) {
        order.payment_status = None;
        order.estimated_delivery_date = None;
        self.rows.write().expect("legacy tier lock").insert(order.id, order);
    }

    pub fn get(&self, order_id: Uuid) -> Option<Order> {
        self.rows.read().expect("legacy tier lock").get(&order_id).cloned()
    }

    pub fn update_call_count(&self) -> u64 {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TierResolver for InMemoryLegacyTier {
    fn source(&self) -> TierSource {
        TierSource::LegacyCartOrders
    }

    async fn current_status(
        &self,
        order_id: Uuid,
    ) -> Result<Option<StatusSnapshot>, ServiceError> {
        Ok(self
            .rows
            .read()
            .expect("legacy tier lock")
            .get(&order_id)
            .map(|o| StatusSnapshot {
                status: o.status,
                payment_status: None,
            }))
    }

    async fn apply_update(
        &self,
        order_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<WriteAttempt, ServiceError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().expect("legacy tier lock");
        let Some(order) = rows.get_mut(&order_id) else {
            return Ok(WriteAttempt::NotFound);
        };
        // No estimated_delivery_date column on this schema; the field is
        // stripped rather than erroring the whole write.
        order.status = update.new_status;
        if let Some(reason) = &update.rejection_reason {
            order.payment_rejection_reason = Some(reason.clone());
        }
        order.updated_at = Some(Utc::now());
        Ok(WriteAttempt::Applied(order.clone()))
    }
}

/// A persisted per-supplier decomposition row. Keeps enough of the parent's
/// context (buyer) to present the part as a standalone sub-order.
#[derive(Clone, Debug)]
pub struct SupplierPartRow {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub part: SupplierPart,
}

impl SupplierPartRow {
    /// The sub-order view of this part, as returned from writes.
    fn as_order(&self) -> Order {
        Order {
            id: self.id,
            buyer_id: self.buyer_id,
            status: self.part.status,
            payment_status: self.part.payment_status,
            items: self.part.items.clone(),
            subtotal: self.part.subtotal,
            shipping_amount: self.part.shipping_allocation,
            payment_method: None,
            payment_rejection_reason: None,
            estimated_delivery_date: self.part.estimated_delivery_date,
            created_at: self.part.created_at,
            updated_at: self.part.updated_at,
        }
    }
}

/// Supplier-part tier: lets a supplier advance their slice of a multi-vendor
/// order independently of the parent.
#[derive(Default)]
pub struct InMemorySupplierPartTier {
    rows: RwLock<HashMap<Uuid, SupplierPartRow>>,
    update_calls: AtomicU64,
}

impl InMemorySupplierPartTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: SupplierPartRow) {
        self.rows.write().expect("part tier lock").insert(row.id, row);
    }

    pub fn get(&self, part_id: Uuid) -> Option<SupplierPartRow> {
        self.rows.read().expect("part tier lock").get(&part_id).cloned()
    }

    pub fn update_call_count(&self) -> u64 {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TierResolver for InMemorySupplierPartTier {
    fn source(&self) -> TierSource {
        TierSource::SupplierParts
    }

    async fn current_status(
        &self,
        order_id: Uuid,
    ) -> Result<Option<StatusSnapshot>, ServiceError> {
        Ok(self
            .rows
            .read()
            .expect("part tier lock")
            .get(&order_id)
            .map(|row| StatusSnapshot {
                status: row.part.status,
                payment_status: row.part.payment_status,
            }))
    }

    async fn apply_update(
        &self,
        order_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<WriteAttempt, ServiceError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().expect("part tier lock");
        let Some(row) = rows.get_mut(&order_id) else {
            return Ok(WriteAttempt::NotFound);
        };
        row.part.status = update.new_status;
        if let Some(estimate) = update.estimated_delivery_date {
            row.part.estimated_delivery_date = Some(estimate);
        }
        row.part.updated_at = Some(Utc::now());
        Ok(WriteAttempt::Applied(row.as_order()))
    }
}

/// Projection source merging canonical and legacy rows, newest first, the
/// way the order list is assembled for display.
pub struct InMemoryProjection {
    canonical: Arc<InMemoryCanonicalTier>,
    legacy: Arc<InMemoryLegacyTier>,
    fetch_calls: AtomicU64,
}

impl InMemoryProjection {
    pub fn new(canonical: Arc<InMemoryCanonicalTier>, legacy: Arc<InMemoryLegacyTier>) -> Self {
        Self {
            canonical,
            legacy,
            fetch_calls: AtomicU64::new(0),
        }
    }

    pub fn fetch_call_count(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectionSource for InMemoryProjection {
    async fn fetch_orders(&self) -> Result<Vec<Order>, ServiceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut orders: Vec<Order> = self
            .canonical
            .rows
            .read()
            .expect("canonical tier lock")
            .values()
            .cloned()
            .collect();
        orders.extend(
            self.legacy
                .rows
                .read()
                .expect("legacy tier lock")
                .values()
                .cloned(),
        );
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}
