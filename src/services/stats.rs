//! Supplier-side sales statistics.
//!
//! Pure aggregation over derived supplier parts. Revenue counts a part once
//! it is accepted; items sold only once delivered.

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Order, OrderStatus};
use crate::services::split::split_many;

/// Aggregated view of one supplier's slice of a set of orders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SupplierStats {
    pub counts_by_status: HashMap<OrderStatus, usize>,
    /// Sum of part subtotals over accepted, in-transit and delivered parts.
    pub total_revenue: Decimal,
    /// Units across delivered parts.
    pub total_items_sold: u64,
}

/// Aggregates the supplier's parts across the given orders.
pub fn supplier_stats(orders: &[Order], supplier_id: Uuid) -> SupplierStats {
    let mut stats = SupplierStats::default();
    for part in split_many(orders) {
        if part.supplier_id != Some(supplier_id) {
            continue;
        }
        *stats.counts_by_status.entry(part.status).or_insert(0) += 1;
        if matches!(
            part.status,
            OrderStatus::Accepted | OrderStatus::InTransit | OrderStatus::Delivered
        ) {
            stats.total_revenue += part.subtotal;
        }
        if part.status == OrderStatus::Delivered {
            stats.total_items_sold += part
                .items
                .iter()
                .map(|item| u64::from(item.quantity))
                .sum::<u64>();
        }
    }
    stats
}
