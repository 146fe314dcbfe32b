//! Realtime change subscription boundary.
//!
//! The synchronization store subscribes to row-change pushes for a buyer's
//! orders and debounces them into projection refreshes. The transport is
//! abstracted behind [`RealtimeChannel`]; tests drive [`MemoryChannel`]
//! directly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use uuid::Uuid;

use crate::models::OrderStatus;

/// Kind of row change pushed by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One pushed change for a buyer's order row.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub new_status: Option<OrderStatus>,
}

/// Handle returned by [`RealtimeChannel::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Push transport for order-row changes, filtered by buyer.
pub trait RealtimeChannel: Send + Sync {
    fn subscribe(
        &self,
        buyer_id: Uuid,
        callback: Box<dyn Fn(ChangeEvent) + Send + Sync>,
    ) -> SubscriptionId;

    /// Idempotent: unsubscribing a dead or unknown id is a no-op.
    fn unsubscribe(&self, id: SubscriptionId);
}

type Callback = Box<dyn Fn(ChangeEvent) + Send + Sync>;

/// In-process channel. `publish` delivers synchronously to every matching
/// subscriber on the caller's thread.
#[derive(Default)]
pub struct MemoryChannel {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<u64, (Uuid, Callback)>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: ChangeEvent) {
        let subscribers = self.subscribers.read().expect("channel lock");
        for (buyer_id, callback) in subscribers.values() {
            if *buyer_id == event.buyer_id {
                callback(event.clone());
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("channel lock").len()
    }
}

impl RealtimeChannel for MemoryChannel {
    fn subscribe(
        &self,
        buyer_id: Uuid,
        callback: Box<dyn Fn(ChangeEvent) + Send + Sync>,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .write()
            .expect("channel lock")
            .insert(id, (buyer_id, callback));
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().expect("channel lock").remove(&id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn event(buyer_id: Uuid) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Update,
            order_id: Uuid::new_v4(),
            buyer_id,
            new_status: Some(OrderStatus::Accepted),
        }
    }

    #[test]
    fn delivers_only_to_matching_buyer() {
        let channel = MemoryChannel::new();
        let buyer = Uuid::new_v4();
        let hits = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&hits);
        channel.subscribe(buyer, Box::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        let other_counted = Arc::clone(&hits);
        channel.subscribe(Uuid::new_v4(), Box::new(move |_| {
            other_counted.fetch_add(1, Ordering::SeqCst);
        }));

        channel.publish(event(buyer));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let channel = MemoryChannel::new();
        let id = channel.subscribe(Uuid::new_v4(), Box::new(|_| {}));
        channel.unsubscribe(id);
        channel.unsubscribe(id);
        channel.unsubscribe(SubscriptionId(999));
        assert_eq!(channel.subscriber_count(), 0);
    }
}
