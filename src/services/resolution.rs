//! Multi-tier resolution chain.
//!
//! Routes status reads and writes across the three persistence generations.
//! Writes validate against the transition authority first, then fan out in
//! fixed priority order and stop at the first tier that owns the record.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::Order;
use crate::services::transition::check_transition;
use crate::tiers::{StatusSnapshot, StatusUpdate, TierResolver, TierSource, WriteAttempt};

/// A successful write, tagged with the tier that accepted it.
#[derive(Clone, Debug)]
pub struct UpdateOutcome {
    pub order: Order,
    pub source: TierSource,
}

/// Fixed-priority chain over the three tiers.
///
/// Writes try supplier parts first (a part id must never fall through to the
/// parent tables), then canonical orders, then the legacy table. Reads prefer
/// the canonical row and fall back the other way, ending at parts so
/// part-only ids still resolve.
pub struct ResolutionChain {
    write_order: Vec<Arc<dyn TierResolver>>,
    read_order: Vec<Arc<dyn TierResolver>>,
}

impl ResolutionChain {
    pub fn new(
        parts: Arc<dyn TierResolver>,
        canonical: Arc<dyn TierResolver>,
        legacy: Arc<dyn TierResolver>,
    ) -> Self {
        Self {
            write_order: vec![
                Arc::clone(&parts),
                Arc::clone(&canonical),
                Arc::clone(&legacy),
            ],
            read_order: vec![canonical, legacy, parts],
        }
    }

    /// Reads the record's transition-relevant fields from the first tier that
    /// owns it.
    #[instrument(skip(self))]
    pub async fn current_status(
        &self,
        order_id: Uuid,
    ) -> Result<Option<(StatusSnapshot, TierSource)>, ServiceError> {
        for tier in &self.read_order {
            if let Some(snapshot) = tier.current_status(order_id).await? {
                return Ok(Some((snapshot, tier.source())));
            }
        }
        Ok(None)
    }

    /// Validates and applies a status update.
    ///
    /// The pre-write snapshot supplies the current status and payment status
    /// for validation; a record found in no tier fails before any write is
    /// attempted. The write then fans out and stops at the first tier that
    /// applies it.
    #[instrument(skip(self, update), fields(new_status = %update.new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, ServiceError> {
        let Some((snapshot, read_source)) = self.current_status(order_id).await? else {
            warn!(%order_id, "status update for record unknown to every tier");
            metrics::counter!("ordersync_resolution_miss_total", 1);
            return Err(ServiceError::BackendUnavailable(order_id));
        };

        check_transition(snapshot.status, update.new_status, snapshot.payment_status)?;

        for tier in &self.write_order {
            match tier.apply_update(order_id, &update).await? {
                WriteAttempt::Applied(order) => {
                    debug!(
                        %order_id,
                        tier = tier.source().table_name(),
                        read_tier = read_source.table_name(),
                        "status update applied"
                    );
                    metrics::counter!(
                        "ordersync_resolution_write_total",
                        1,
                        "tier" => tier.source().table_name()
                    );
                    return Ok(UpdateOutcome {
                        order,
                        source: tier.source(),
                    });
                }
                WriteAttempt::NotFound => continue,
            }
        }

        // Read located the record but no tier accepted the write: the row was
        // deleted between the two calls.
        warn!(%order_id, "record vanished between snapshot and write");
        metrics::counter!("ordersync_resolution_miss_total", 1);
        Err(ServiceError::BackendUnavailable(order_id))
    }
}
