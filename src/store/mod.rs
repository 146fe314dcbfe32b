//! Client synchronization store.
//!
//! Mutable in-memory projection of a buyer's orders. Owns optimistic status
//! updates, request dedup, rollback refetch, and refresh scheduling driven by
//! realtime pushes and a staleness timer. All mutation of the projection
//! flows through this module's entry points.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus, PaymentStatus, SupplierPart};
use crate::realtime::{RealtimeChannel, SubscriptionId};
use crate::services::notifications::NotificationFanout;
use crate::services::resolution::{ResolutionChain, UpdateOutcome};
use crate::services::split::split_by_supplier;
use crate::tiers::StatusUpdate;

/// Backend view the store refreshes from: the merged, buyer-scoped order
/// list across tiers.
#[async_trait]
pub trait ProjectionSource: Send + Sync {
    async fn fetch_orders(&self) -> Result<Vec<Order>, ServiceError>;
}

/// One order as presented to read-side callers.
#[derive(Clone, Debug)]
pub struct ProjectedOrder {
    pub order: Order,
    /// Spanish status name shown in the UI.
    pub display_status: &'static str,
    pub display_code: String,
    pub is_late: bool,
    /// Per-supplier decomposition, recomputed on every read so it can never
    /// go stale against the parent.
    pub parts: Vec<SupplierPart>,
}

impl ProjectedOrder {
    fn from_order(order: Order) -> Self {
        let parts = split_by_supplier(&order);
        Self {
            display_status: order.status.display_name(),
            display_code: order.display_code(),
            is_late: order.is_late(chrono::Utc::now()),
            parts,
            order,
        }
    }
}

#[derive(Default)]
struct ProjectionState {
    /// Sorted newest first; the source fetch already orders them but
    /// optimistic writes keep positions unchanged.
    orders: Vec<Order>,
    status_filter: Option<OrderStatus>,
    last_refreshed: Option<Instant>,
}

type SharedUpdate = Shared<BoxFuture<'static, Result<UpdateOutcome, ServiceError>>>;

/// The synchronization store. Constructed once per session and passed
/// explicitly; never a global.
pub struct OrderStore {
    config: SyncConfig,
    chain: Arc<ResolutionChain>,
    notifications: Arc<NotificationFanout>,
    source: Arc<dyn ProjectionSource>,
    state: RwLock<ProjectionState>,
    in_flight: DashMap<(Uuid, OrderStatus), SharedUpdate>,
    refresh_pending: AtomicBool,
}

impl OrderStore {
    pub fn new(
        config: SyncConfig,
        chain: Arc<ResolutionChain>,
        notifications: Arc<NotificationFanout>,
        source: Arc<dyn ProjectionSource>,
    ) -> Self {
        Self {
            config,
            chain,
            notifications,
            source,
            state: RwLock::new(ProjectionState::default()),
            in_flight: DashMap::new(),
            refresh_pending: AtomicBool::new(false),
        }
    }

    /// Initial authoritative load. Call once after construction.
    pub async fn initialize(&self) -> Result<(), ServiceError> {
        self.refresh_now().await
    }

    /// Requests a status transition for an order.
    ///
    /// The displayed status flips optimistically before any remote work. A
    /// second caller requesting the same `(order_id, new_status)` while the
    /// first is in flight awaits the same shared operation; exactly one
    /// backend call is made and both observe its outcome. On success a
    /// confirmatory refetch is scheduled after `refetch_delay_ms`; on failure
    /// authoritative state is refetched immediately and the error re-raised.
    #[instrument(skip(self, update), fields(new_status = %update.new_status))]
    pub async fn update_status(
        self: &Arc<Self>,
        order_id: Uuid,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, ServiceError> {
        let new_status = update.new_status;
        self.apply_optimistic(order_id, new_status)?;

        let key = (order_id, new_status);
        let shared = match self.in_flight.entry(key) {
            Entry::Occupied(existing) => {
                debug!(%order_id, "joining in-flight update");
                metrics::counter!("ordersync_store_update_deduped_total", 1);
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let store = Arc::clone(self);
                let fut = async move {
                    let result = store.chain.update_status(order_id, update).await;
                    match &result {
                        Ok(outcome) => {
                            store
                                .notifications
                                .notify_status_change(&outcome.order, outcome.order.status)
                                .await;
                            store.schedule_confirmatory_refetch();
                        }
                        Err(err) => {
                            warn!(%order_id, error = %err, "update failed, reverting");
                            metrics::counter!("ordersync_store_rollback_total", 1);
                            if let Err(refresh_err) = store.refresh_now().await {
                                warn!(error = %refresh_err, "rollback refetch failed");
                            }
                        }
                    }
                    store.in_flight.remove(&(order_id, new_status));
                    result
                }
                .boxed()
                .shared();
                slot.insert(fut.clone());
                fut
            }
        };

        shared.await
    }

    /// Subscribes the store to realtime changes for the buyer. Every event
    /// schedules a debounced refresh.
    pub fn watch(
        self: &Arc<Self>,
        channel: &dyn RealtimeChannel,
        buyer_id: Uuid,
    ) -> SubscriptionId {
        let weak: Weak<OrderStore> = Arc::downgrade(self);
        channel.subscribe(
            buyer_id,
            Box::new(move |event| {
                if let Some(store) = weak.upgrade() {
                    debug!(order_id = %event.order_id, kind = ?event.kind, "realtime change");
                    store.request_refresh();
                }
            }),
        )
    }

    /// Spawns the staleness watcher: when the projection has not been
    /// confirmed within `stale_after_secs`, a debounced refresh is scheduled.
    pub fn spawn_staleness_watcher(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = self.config.stale_after();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else { break };
                let stale = {
                    let state = store.state.read().expect("projection lock");
                    state
                        .last_refreshed
                        .map(|at| at.elapsed() >= store.config.stale_after())
                        .unwrap_or(true)
                };
                if stale {
                    debug!("projection stale, scheduling refresh");
                    store.request_refresh();
                }
            }
        });
    }

    /// Schedules a debounced full refresh. Calls landing inside the
    /// coalescing window collapse into one backend fetch.
    pub fn request_refresh(self: &Arc<Self>) {
        if self.refresh_pending.swap(true, Ordering::SeqCst) {
            return;
        }
        let store = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(store.config.debounce()).await;
            store.refresh_pending.store(false, Ordering::SeqCst);
            if let Err(err) = store.refresh_now().await {
                warn!(error = %err, "debounced refresh failed");
            }
        });
    }

    /// Fetches authoritative state and replaces the projection. Later
    /// arrivals win wholesale; no per-order merging.
    pub async fn refresh_now(&self) -> Result<(), ServiceError> {
        let orders = self.source.fetch_orders().await?;
        let mut state = self.state.write().expect("projection lock");
        state.orders = orders;
        state.last_refreshed = Some(Instant::now());
        Ok(())
    }

    pub fn set_status_filter(&self, filter: Option<OrderStatus>) {
        self.state.write().expect("projection lock").status_filter = filter;
    }

    /// Orders visible to the buyer under the payment-visibility rule and the
    /// active status filter, newest first.
    pub fn filtered_orders(&self) -> Vec<ProjectedOrder> {
        let state = self.state.read().expect("projection lock");
        let mut orders: Vec<ProjectedOrder> = state
            .orders
            .iter()
            .filter(|o| is_visible(o))
            .filter(|o| state.status_filter.map_or(true, |f| o.status == f))
            .cloned()
            .map(ProjectedOrder::from_order)
            .collect();
        orders.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        orders
    }

    /// Visible-order counts per status, filter-independent.
    pub fn status_summary(&self) -> HashMap<OrderStatus, usize> {
        let state = self.state.read().expect("projection lock");
        let mut summary = HashMap::new();
        for order in state.orders.iter().filter(|o| is_visible(o)) {
            *summary.entry(order.status).or_insert(0) += 1;
        }
        summary
    }

    pub fn order_by_id(&self, order_id: Uuid) -> Option<ProjectedOrder> {
        let state = self.state.read().expect("projection lock");
        state
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .map(ProjectedOrder::from_order)
    }

    /// Clears all projection state. Used at logout and between tests.
    pub fn reset(&self) {
        let mut state = self.state.write().expect("projection lock");
        *state = ProjectionState::default();
        drop(state);
        self.in_flight.clear();
        self.refresh_pending.store(false, Ordering::SeqCst);
    }

    /// Synchronous optimistic flip. Unknown ids are a caller error surfaced
    /// before any remote work.
    fn apply_optimistic(&self, order_id: Uuid, new_status: OrderStatus) -> Result<(), ServiceError> {
        let mut state = self.state.write().expect("projection lock");
        let Some(order) = state.orders.iter_mut().find(|o| o.id == order_id) else {
            return Err(ServiceError::Validation(format!(
                "order {order_id} is not in the projection"
            )));
        };
        order.status = new_status;
        Ok(())
    }

    fn schedule_confirmatory_refetch(self: &Arc<Self>) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(store.config.refetch_delay()).await;
            if let Err(err) = store.refresh_now().await {
                warn!(error = %err, "confirmatory refetch failed");
            }
        });
    }
}

/// Canonical orders are shown only once paid; legacy rows predate payment
/// tracking and are never filtered on it.
fn is_visible(order: &Order) -> bool {
    match order.payment_status {
        None | Some(PaymentStatus::Paid) => true,
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn order(status: OrderStatus, payment: Option<PaymentStatus>, age_mins: i64) -> Order {
        Order {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            status,
            payment_status: payment,
            items: vec![],
            subtotal: dec!(1000),
            shipping_amount: dec!(100),
            payment_method: None,
            payment_rejection_reason: None,
            estimated_delivery_date: None,
            created_at: Utc::now() - Duration::minutes(age_mins),
            updated_at: None,
        }
    }

    struct FixedSource(Vec<Order>);

    #[async_trait]
    impl ProjectionSource for FixedSource {
        async fn fetch_orders(&self) -> Result<Vec<Order>, ServiceError> {
            Ok(self.0.clone())
        }
    }

    fn store_with(orders: Vec<Order>) -> Arc<OrderStore> {
        use crate::services::notifications::{NotificationFanout, NotificationRpc};
        use crate::tiers::memory::{
            InMemoryCanonicalTier, InMemoryLegacyTier, InMemorySupplierPartTier,
        };
        use crate::tiers::TierResolver;

        struct NullRpc;
        #[async_trait]
        impl NotificationRpc for NullRpc {
            async fn deliver(
                &self,
                _n: crate::models::Notification,
            ) -> Result<(), ServiceError> {
                Ok(())
            }
        }

        let chain = Arc::new(ResolutionChain::new(
            Arc::new(InMemorySupplierPartTier::new()) as Arc<dyn TierResolver>,
            Arc::new(InMemoryCanonicalTier::new()) as Arc<dyn TierResolver>,
            Arc::new(InMemoryLegacyTier::new()) as Arc<dyn TierResolver>,
        ));
        let fanout = Arc::new(NotificationFanout::new(Arc::new(NullRpc)));
        Arc::new(OrderStore::new(
            SyncConfig::default(),
            chain,
            fanout,
            Arc::new(FixedSource(orders)),
        ))
    }

    #[tokio::test]
    async fn visibility_hides_unpaid_canonical_rows() {
        let visible_legacy = order(OrderStatus::Pending, None, 1);
        let visible_paid = order(OrderStatus::Accepted, Some(PaymentStatus::Paid), 2);
        let hidden = order(OrderStatus::Pending, Some(PaymentStatus::Pending), 3);
        let store = store_with(vec![visible_legacy, visible_paid, hidden]);
        store.initialize().await.unwrap();

        let visible = store.filtered_orders();
        assert_eq!(visible.len(), 2);
        assert!(visible
            .iter()
            .all(|p| matches!(p.order.payment_status, None | Some(PaymentStatus::Paid))));
    }

    #[tokio::test]
    async fn filtered_orders_sorted_newest_first_and_filterable() {
        let newer = order(OrderStatus::Pending, None, 1);
        let older = order(OrderStatus::Accepted, None, 60);
        let store = store_with(vec![older.clone(), newer.clone()]);
        store.initialize().await.unwrap();

        let all = store.filtered_orders();
        assert_eq!(all[0].order.id, newer.id);
        assert_eq!(all[1].order.id, older.id);

        store.set_status_filter(Some(OrderStatus::Accepted));
        let filtered = store.filtered_orders();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].order.id, older.id);
        assert_eq!(filtered[0].display_status, "Aceptado");
    }

    #[tokio::test]
    async fn status_summary_counts_visible_orders() {
        let store = store_with(vec![
            order(OrderStatus::Pending, None, 1),
            order(OrderStatus::Pending, None, 2),
            order(OrderStatus::Delivered, Some(PaymentStatus::Paid), 3),
            order(OrderStatus::Pending, Some(PaymentStatus::Expired), 4),
        ]);
        store.initialize().await.unwrap();

        let summary = store.status_summary();
        assert_eq!(summary[&OrderStatus::Pending], 2);
        assert_eq!(summary[&OrderStatus::Delivered], 1);
    }

    #[tokio::test]
    async fn unknown_order_id_is_a_synchronous_validation_error() {
        let store = store_with(vec![]);
        store.initialize().await.unwrap();

        let err = store
            .update_status(Uuid::new_v4(), StatusUpdate::to(OrderStatus::Accepted))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn reset_clears_projection() {
        let store = store_with(vec![order(OrderStatus::Pending, None, 1)]);
        store.initialize().await.unwrap();
        assert_eq!(store.filtered_orders().len(), 1);

        store.reset();
        assert!(store.filtered_orders().is_empty());
        assert!(store.status_summary().is_empty());
    }
}
