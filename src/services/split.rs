//! Order splitting & proration engine.
//!
//! Derives per-supplier parts from a flat order. Pure and deterministic:
//! called by the synchronization store on every read and by the statistics
//! service, with no stored intermediate state.

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::models::{Order, OrderItem, SupplierPart};

/// Splits an order into per-supplier parts.
///
/// Items are grouped by resolved supplier id in first-appearance order. With
/// zero or one distinct suppliers the result is a single non-split part
/// carrying the full shipping amount. With two or more, shipping is prorated
/// by each group's share of the subtotal, rounded to the nearest currency
/// unit. The last group instead receives the exact remainder so the
/// allocations always sum to the order's shipping amount.
///
/// Items with no resolvable supplier id are excluded from every group and
/// therefore from settlement (long-standing behavior, kept as documented).
pub fn split_by_supplier(order: &Order) -> Vec<SupplierPart> {
    let mut groups: Vec<(Uuid, Vec<OrderItem>)> = Vec::new();
    for item in &order.items {
        let Some(sid) = item.resolved_supplier_id() else {
            continue;
        };
        match groups.iter_mut().find(|(gid, _)| *gid == sid) {
            Some((_, items)) => items.push(item.clone()),
            None => groups.push((sid, vec![item.clone()])),
        }
    }

    if groups.len() <= 1 {
        let supplier_id = groups.first().map(|(sid, _)| *sid);
        return vec![whole_order_part(order, supplier_id)];
    }

    let entries: Vec<(Uuid, Vec<OrderItem>, Decimal)> = groups
        .into_iter()
        .map(|(sid, items)| {
            let subtotal = items.iter().map(OrderItem::line_subtotal).sum();
            (sid, items, subtotal)
        })
        .collect();

    let total_subtotal: Decimal = entries.iter().map(|(_, _, s)| *s).sum();
    // All-zero subtotals would divide by zero; every share then rounds to
    // zero and the last group absorbs the whole shipping amount.
    let denominator = if total_subtotal.is_zero() {
        Decimal::ONE
    } else {
        total_subtotal
    };

    let shipping_total = order.shipping_amount;
    let last = entries.len() - 1;
    let mut allocated = Decimal::ZERO;

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, (sid, items, subtotal))| {
            let allocation = if idx == last {
                (shipping_total - allocated).max(Decimal::ZERO)
            } else {
                let share = (shipping_total * subtotal / denominator)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
                allocated += share;
                share
            };
            SupplierPart {
                parent_order_id: order.id,
                supplier_id: Some(sid),
                items,
                subtotal,
                shipping_allocation: allocation,
                final_amount: subtotal + allocation,
                status: order.status,
                payment_status: order.payment_status,
                is_split: true,
                estimated_delivery_date: order.estimated_delivery_date,
                created_at: order.created_at,
                updated_at: order.updated_at,
            }
        })
        .collect()
}

/// Splits many orders, flattening the parts.
pub fn split_many(orders: &[Order]) -> Vec<SupplierPart> {
    orders.iter().flat_map(split_by_supplier).collect()
}

fn whole_order_part(order: &Order, supplier_id: Option<Uuid>) -> SupplierPart {
    let item_subtotal: Decimal = order.items.iter().map(OrderItem::line_subtotal).sum();
    // Empty item lists still occur on historical rows; trust the stored
    // subtotal there.
    let subtotal = if order.items.is_empty() {
        order.subtotal
    } else {
        item_subtotal
    };
    SupplierPart {
        parent_order_id: order.id,
        supplier_id,
        items: order.items.clone(),
        subtotal,
        shipping_allocation: order.shipping_amount,
        final_amount: subtotal + order.shipping_amount,
        status: order.status,
        payment_status: order.payment_status,
        is_split: false,
        estimated_delivery_date: order.estimated_delivery_date,
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}
