use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{short_code, OrderItem, OrderStatus, PaymentStatus};

/// The portion of a multi-vendor order attributable to one supplier.
///
/// Parts are either synthesized on demand by
/// [`crate::services::split::split_by_supplier`] (recomputed deterministically
/// on every read, never stored) or persisted independently in the
/// supplier-part tier, never both authoritative at the same time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplierPart {
    pub parent_order_id: Uuid,
    /// `None` only on the degenerate single part of an order whose items
    /// carry no resolvable supplier.
    pub supplier_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    /// This supplier's share of the parent's shipping cost. Across all parts
    /// of one parent these sum exactly to the parent's `shipping_amount`.
    pub shipping_allocation: Decimal,
    pub final_amount: Decimal,
    pub status: OrderStatus,
    /// Inherited from the parent unless the owning supplier advanced the
    /// part independently.
    pub payment_status: Option<PaymentStatus>,
    /// `false` when the part mirrors the whole order (0 or 1 suppliers).
    pub is_split: bool,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SupplierPart {
    /// Stable synthetic identifier for derived parts.
    pub fn synthetic_id(&self) -> String {
        match self.supplier_id {
            Some(sid) => format!("{}-{}", self.parent_order_id, sid),
            None => self.parent_order_id.to_string(),
        }
    }

    /// Parent order display code, repeated on every part for grouping.
    pub fn display_code(&self) -> String {
        short_code(&self.parent_order_id.to_string(), 'K')
    }

    /// Per-part display code (`C` prefix), distinct per supplier. Mixes
    /// digits from both ids so parts of one parent never collide.
    pub fn part_display_code(&self) -> String {
        let parent = self.parent_order_id.simple().to_string();
        match self.supplier_id {
            Some(sid) => {
                let sid = sid.simple().to_string();
                short_code(&format!("{}{}", &parent[..5], &sid[..5]), 'C')
            }
            None => short_code(&parent, 'C'),
        }
    }
}
