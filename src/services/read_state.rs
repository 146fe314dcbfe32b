//! Read-state reconciliation.
//!
//! Marking notifications read must feel instant and survive page reloads even
//! when the remote write fails. The reconciler keeps a forced-read overlay
//! and a durable write-ahead buffer in local storage, updated before any
//! remote call, then retries the remote write with backoff. A discrepancy
//! that survives every retry is logged and masked by the overlay, never
//! surfaced.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::errors::ServiceError;
use crate::storage::LocalStore;

const BUFFER_KEY: &str = "read_state/buffer";
const OVERLAY_KEY: &str = "read_state/overlay";

/// Remote read-receipt boundary.
#[async_trait]
pub trait ReadReceiptBackend: Send + Sync {
    /// Marks the ids read server-side.
    async fn mark_read(&self, ids: &[Uuid]) -> Result<(), ServiceError>;

    /// Returns which of the ids the server still considers unread.
    async fn still_unread(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, ServiceError>;
}

/// Client-side read-state authority.
pub struct ReadStateReconciler {
    backend: Arc<dyn ReadReceiptBackend>,
    local: Arc<dyn LocalStore>,
    config: SyncConfig,
    overlay: RwLock<HashSet<Uuid>>,
}

impl ReadStateReconciler {
    pub fn new(
        backend: Arc<dyn ReadReceiptBackend>,
        local: Arc<dyn LocalStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            backend,
            local,
            config,
            overlay: RwLock::new(HashSet::new()),
        }
    }

    /// Whether the overlay forces this notification to display as read,
    /// regardless of what the server says.
    pub fn is_forced_read(&self, id: Uuid) -> bool {
        self.overlay.read().expect("overlay lock").contains(&id)
    }

    pub fn overlay_len(&self) -> usize {
        self.overlay.read().expect("overlay lock").len()
    }

    /// Marks notifications read. The overlay and the durable buffer are
    /// updated synchronously before the remote write is even scheduled, so
    /// the UI flips immediately and a reload cannot lose the intent.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn mark_as_read(self: &Arc<Self>, ids: Vec<Uuid>) {
        if ids.is_empty() {
            return;
        }
        {
            let mut overlay = self.overlay.write().expect("overlay lock");
            overlay.extend(ids.iter().copied());
        }
        self.persist_overlay();
        self.buffer_append(&ids);

        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            reconciler.reconcile().await;
        });
    }

    /// Reloads overlay and buffer from local storage and re-attempts any
    /// pending reconciliation. Called once at startup.
    #[instrument(skip(self))]
    pub async fn replay_at_startup(self: &Arc<Self>) {
        if let Some(stored) = self.local.get(OVERLAY_KEY) {
            let ids = ids_from_value(&stored);
            let mut overlay = self.overlay.write().expect("overlay lock");
            overlay.extend(ids);
        }
        let pending = self.buffered_ids();
        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len(), "replaying buffered read receipts");
        self.reconcile().await;
    }

    /// Runs the full retry loop against the current buffer. Exposed so tests
    /// can await reconciliation instead of racing the spawned task.
    pub async fn reconcile(&self) {
        let mut pending = self.buffered_ids();
        if pending.is_empty() {
            return;
        }

        for attempt in 1..=self.config.read_receipt_max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.read_receipt_backoff(attempt - 1)).await;
            }
            match self.attempt(&pending).await {
                Ok(remaining) => {
                    let confirmed: Vec<Uuid> = pending
                        .iter()
                        .copied()
                        .filter(|id| !remaining.contains(id))
                        .collect();
                    if !confirmed.is_empty() {
                        self.buffer_remove(&confirmed);
                    }
                    pending = remaining;
                    if pending.is_empty() {
                        return;
                    }
                    warn!(
                        attempt,
                        remaining = pending.len(),
                        "read receipts still unread after attempt"
                    );
                }
                Err(err) => {
                    warn!(attempt, error = %err, "read receipt attempt failed");
                    metrics::counter!("ordersync_read_receipt_retries_total", 1);
                }
            }
        }

        // Out of attempts; the overlay keeps masking the discrepancy and the
        // buffer keeps the ids for the next startup replay.
        error!(
            remaining = pending.len(),
            "read receipt reconciliation exhausted retries"
        );
        metrics::counter!("ordersync_read_receipt_exhausted_total", 1);
    }

    /// Drops overlay and buffer state. Used at logout and between tests.
    pub fn reset(&self) {
        self.overlay.write().expect("overlay lock").clear();
        self.local.remove(OVERLAY_KEY);
        self.local.remove(BUFFER_KEY);
    }

    async fn attempt(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, ServiceError> {
        self.backend.mark_read(ids).await?;
        self.backend.still_unread(ids).await
    }

    fn buffered_ids(&self) -> Vec<Uuid> {
        self.local
            .get(BUFFER_KEY)
            .map(|v| ids_from_value(&v))
            .unwrap_or_default()
    }

    fn buffer_append(&self, ids: &[Uuid]) {
        let mut buffered = self.buffered_ids();
        for id in ids {
            if !buffered.contains(id) {
                buffered.push(*id);
            }
        }
        self.local.set(BUFFER_KEY, json!(buffered));
    }

    fn buffer_remove(&self, confirmed: &[Uuid]) {
        let buffered: Vec<Uuid> = self
            .buffered_ids()
            .into_iter()
            .filter(|id| !confirmed.contains(id))
            .collect();
        if buffered.is_empty() {
            self.local.remove(BUFFER_KEY);
        } else {
            self.local.set(BUFFER_KEY, json!(buffered));
        }
    }

    fn persist_overlay(&self) {
        let overlay: Vec<Uuid> = self
            .overlay
            .read()
            .expect("overlay lock")
            .iter()
            .copied()
            .collect();
        self.local.set(OVERLAY_KEY, json!(overlay));
    }
}

fn ids_from_value(value: &serde_json::Value) -> Vec<Uuid> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}
