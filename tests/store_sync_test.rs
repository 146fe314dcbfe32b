//! Synchronization-store behavior: request dedup, optimistic rollback,
//! debounced realtime refresh and the staleness timer.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::{item, order_with, paid_order, RecordingRpc, TestEnv};
use rust_decimal_macros::dec;
use uuid::Uuid;

use ordersync::config::SyncConfig;
use ordersync::errors::ServiceError;
use ordersync::models::{OrderStatus, PaymentStatus};
use ordersync::realtime::{ChangeEvent, ChangeKind, MemoryChannel};
use ordersync::services::notifications::{NotificationFanout, NotificationRpc};
use ordersync::services::resolution::ResolutionChain;
use ordersync::store::OrderStore;
use ordersync::tiers::memory::{
    InMemoryCanonicalTier, InMemoryLegacyTier, InMemoryProjection, InMemorySupplierPartTier,
};
use ordersync::tiers::{
    StatusSnapshot, StatusUpdate, TierResolver, TierSource, WriteAttempt,
};

/// Wraps the canonical tier with a write delay so two callers overlap.
struct SlowCanonical {
    inner: Arc<InMemoryCanonicalTier>,
    delay: Duration,
}

#[async_trait]
impl TierResolver for SlowCanonical {
    fn source(&self) -> TierSource {
        self.inner.source()
    }

    async fn current_status(
        &self,
        order_id: Uuid,
    ) -> Result<Option<StatusSnapshot>, ServiceError> {
        self.inner.current_status(order_id).await
    }

    async fn apply_update(
        &self,
        order_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<WriteAttempt, ServiceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.apply_update(order_id, update).await
    }
}

fn slow_env(delay: Duration) -> (Arc<InMemoryCanonicalTier>, Arc<OrderStore>) {
    let canonical = Arc::new(InMemoryCanonicalTier::new());
    let legacy = Arc::new(InMemoryLegacyTier::new());
    let chain = Arc::new(ResolutionChain::new(
        Arc::new(InMemorySupplierPartTier::new()) as Arc<dyn TierResolver>,
        Arc::new(SlowCanonical {
            inner: Arc::clone(&canonical),
            delay,
        }) as Arc<dyn TierResolver>,
        Arc::clone(&legacy) as Arc<dyn TierResolver>,
    ));
    let projection = Arc::new(InMemoryProjection::new(Arc::clone(&canonical), legacy));
    let fanout = Arc::new(NotificationFanout::new(
        Arc::new(RecordingRpc::default()) as Arc<dyn NotificationRpc>
    ));
    let store = Arc::new(OrderStore::new(
        SyncConfig::default(),
        chain,
        fanout,
        projection,
    ));
    (canonical, store)
}

#[tokio::test(start_paused = true)]
async fn concurrent_same_target_updates_share_one_backend_call() {
    let (canonical, store) = slow_env(Duration::from_millis(50));
    let order = paid_order(vec![item(Uuid::new_v4(), dec!(100), 1)]);
    let id = order.id;
    canonical.insert(order);
    store.initialize().await.unwrap();

    let first = store.update_status(id, StatusUpdate::to(OrderStatus::Accepted));
    let second = store.update_status(id, StatusUpdate::to(OrderStatus::Accepted));
    let (a, b) = tokio::join!(first, second);

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.order.status, OrderStatus::Accepted);
    assert_eq!(b.order.status, OrderStatus::Accepted);
    assert_eq!(a.order.updated_at, b.order.updated_at);
    assert_eq!(canonical.update_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn sequential_same_target_updates_are_separate_calls() {
    let (canonical, store) = slow_env(Duration::from_millis(1));
    let order = paid_order(vec![item(Uuid::new_v4(), dec!(100), 1)]);
    let id = order.id;
    canonical.insert(order);
    store.initialize().await.unwrap();

    store
        .update_status(id, StatusUpdate::to(OrderStatus::Accepted))
        .await
        .unwrap();
    // Same-status no-op, but a fresh request: a second backend call.
    store
        .update_status(id, StatusUpdate::to(OrderStatus::Accepted))
        .await
        .unwrap();
    assert_eq!(canonical.update_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_update_restores_displayed_status() {
    let env = TestEnv::new();
    let order = order_with(
        OrderStatus::Pending,
        Some(PaymentStatus::Pending),
        vec![item(Uuid::new_v4(), dec!(100), 1)],
    );
    let id = order.id;
    env.canonical.insert(order);
    env.store.initialize().await.unwrap();

    let err = env
        .store
        .update_status(id, StatusUpdate::to(OrderStatus::Accepted))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Transition(_));

    // The rollback refetch ran before the error was re-raised.
    let projected = env.store.order_by_id(id).unwrap();
    assert_eq!(projected.order.status, OrderStatus::Pending);
    assert_eq!(projected.display_status, "Pendiente");
}

#[tokio::test(start_paused = true)]
async fn confirmatory_refetch_overwrites_with_backend_truth() {
    let env = TestEnv::new();
    let order = paid_order(vec![item(Uuid::new_v4(), dec!(100), 1)]);
    let id = order.id;
    env.canonical.insert(order);
    env.store.initialize().await.unwrap();
    let fetches_before = env.projection.fetch_call_count();

    env.store
        .update_status(id, StatusUpdate::to(OrderStatus::Accepted))
        .await
        .unwrap();

    // Another actor cancels between the write and the refetch.
    env.canonical
        .apply_update(id, &StatusUpdate::to(OrderStatus::Cancelled))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert!(env.projection.fetch_call_count() > fetches_before);
    assert_eq!(
        env.store.order_by_id(id).unwrap().order.status,
        OrderStatus::Cancelled
    );
}

#[tokio::test(start_paused = true)]
async fn realtime_burst_collapses_into_one_refresh() {
    let env = TestEnv::new();
    let order = paid_order(vec![item(Uuid::new_v4(), dec!(100), 1)]);
    let buyer_id = order.buyer_id;
    let order_id = order.id;
    env.canonical.insert(order);
    env.store.initialize().await.unwrap();
    let fetches_before = env.projection.fetch_call_count();

    let channel = MemoryChannel::new();
    env.store.watch(&channel, buyer_id);
    for _ in 0..5 {
        channel.publish(ChangeEvent {
            kind: ChangeKind::Update,
            order_id,
            buyer_id,
            new_status: Some(OrderStatus::Cancelled),
        });
    }

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(env.projection.fetch_call_count(), fetches_before + 1);
}

#[tokio::test(start_paused = true)]
async fn stale_projection_triggers_refresh() {
    let env = TestEnv::new();
    env.store.initialize().await.unwrap();
    let fetches_before = env.projection.fetch_call_count();

    env.store.spawn_staleness_watcher();
    // Past the 120s staleness window plus the debounce.
    tokio::time::sleep(Duration::from_secs(122)).await;
    assert!(env.projection.fetch_call_count() > fetches_before);
}

#[tokio::test(start_paused = true)]
async fn events_for_other_buyers_do_not_refresh() {
    let env = TestEnv::new();
    let order = paid_order(vec![item(Uuid::new_v4(), dec!(100), 1)]);
    let buyer_id = order.buyer_id;
    env.canonical.insert(order);
    env.store.initialize().await.unwrap();
    let fetches_before = env.projection.fetch_call_count();

    let channel = MemoryChannel::new();
    env.store.watch(&channel, buyer_id);
    channel.publish(ChangeEvent {
        kind: ChangeKind::Update,
        order_id: Uuid::new_v4(),
        buyer_id: Uuid::new_v4(),
        new_status: None,
    });

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(env.projection.fetch_call_count(), fetches_before);
}
