//! Persistence tier boundary.
//!
//! The system migrated through three storage generations without a coherent
//! migration of historical rows, so three representations stay readable and
//! writable indefinitely: a legacy cart-derived table, the canonical
//! payment-order table, and an optional per-supplier decomposition table.
//! Each is wrapped in a [`TierResolver`] and tried in fixed priority order by
//! the resolution chain.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Order, OrderStatus, PaymentStatus};

/// Which tier accepted a read or write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TierSource {
    SupplierParts,
    CanonicalOrders,
    LegacyCartOrders,
}

impl TierSource {
    /// Name of the underlying relational resource.
    pub fn table_name(self) -> &'static str {
        match self {
            TierSource::SupplierParts => "supplier_parts",
            TierSource::CanonicalOrders => "canonical_orders",
            TierSource::LegacyCartOrders => "legacy_cart_orders",
        }
    }
}

/// Fields a status write may carry beyond the status itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub new_status: OrderStatus,
    /// Set when dispatching (`in_transit`). The legacy tier's schema has no
    /// such column and drops it on write.
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl StatusUpdate {
    pub fn to(new_status: OrderStatus) -> Self {
        Self {
            new_status,
            estimated_delivery_date: None,
            rejection_reason: None,
        }
    }

    pub fn with_delivery_estimate(mut self, estimate: DateTime<Utc>) -> Self {
        self.estimated_delivery_date = Some(estimate);
        self
    }

    pub fn with_rejection_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejection_reason = Some(reason.into());
        self
    }
}

/// Pre-write view of a record's transition-relevant fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub status: OrderStatus,
    pub payment_status: Option<PaymentStatus>,
}

/// Outcome of a single tier's write attempt. `NotFound` means the tier does
/// not own a record with this id and the chain should fall through.
#[derive(Clone, Debug)]
pub enum WriteAttempt {
    Applied(Order),
    NotFound,
}

/// One storage tier, addressed by order (or part) id.
#[async_trait]
pub trait TierResolver: Send + Sync {
    fn source(&self) -> TierSource;

    /// Reads the current status and payment status of the record, if this
    /// tier owns it.
    async fn current_status(
        &self,
        order_id: Uuid,
    ) -> Result<Option<StatusSnapshot>, ServiceError>;

    /// Applies the update if this tier owns the record. Tiers never validate
    /// transitions; the chain has already consulted the authority.
    async fn apply_update(
        &self,
        order_id: Uuid,
        update: &StatusUpdate,
    ) -> Result<WriteAttempt, ServiceError>;
}
