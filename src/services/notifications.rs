//! Notification fan-out.
//!
//! Derives per-recipient notifications from order events and delivers them
//! through a single remote procedure. Fire-and-forget: delivery failures are
//! logged and swallowed so the order flow never blocks on notifications.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{
    Notification, NotificationType, Order, OrderStatus, RoleContext,
};

/// Remote notification procedure. One call per recipient, no batch form.
#[async_trait]
pub trait NotificationRpc: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), ServiceError>;
}

/// Spanish title/body templates for buyer-facing status notifications.
fn status_template(status: OrderStatus) -> (&'static str, &'static str) {
    match status {
        OrderStatus::Accepted => (
            "Pedido aceptado",
            "Tu pedido fue aceptado por el proveedor",
        ),
        OrderStatus::Rejected => (
            "Pedido rechazado",
            "Tu pedido fue rechazado por el proveedor",
        ),
        OrderStatus::InTransit => (
            "Pedido en camino",
            "Tu pedido esta en camino",
        ),
        OrderStatus::Delivered => (
            "Pedido entregado",
            "Tu pedido fue entregado",
        ),
        // No dedicated template; the generic one carries the status name.
        _ => ("Actualizacion de pedido", "Tu pedido cambio de estado"),
    }
}

/// Fans order events out to buyers and suppliers.
pub struct NotificationFanout {
    rpc: Arc<dyn NotificationRpc>,
}

impl NotificationFanout {
    pub fn new(rpc: Arc<dyn NotificationRpc>) -> Self {
        Self { rpc }
    }

    /// One buyer notification per line item after a status change.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn notify_status_change(&self, order: &Order, status: OrderStatus) {
        let (title, body) = status_template(status);
        for item in &order.items {
            let notification = Notification {
                id: Uuid::new_v4(),
                user_id: order.buyer_id,
                notification_type: NotificationType::OrderStatus,
                order_id: order.id,
                product_id: Some(item.product_id),
                supplier_id: item.resolved_supplier_id(),
                order_status: Some(status),
                role_context: RoleContext::Buyer,
                context_section: "mis_pedidos".into(),
                title: title.into(),
                body: format!("{body} ({})", status.display_name()),
                metadata: json!({
                    "quantity": item.quantity,
                    "is_offered": item.is_offered,
                }),
                is_read: false,
                created_at: chrono::Utc::now(),
            };
            self.emit(notification).await;
        }
    }

    /// Buyer notifications per item plus exactly one per distinct supplier
    /// when an order is created.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn notify_new_order(&self, order: &Order) {
        for item in &order.items {
            let notification = Notification {
                id: Uuid::new_v4(),
                user_id: order.buyer_id,
                notification_type: NotificationType::OrderNew,
                order_id: order.id,
                product_id: Some(item.product_id),
                supplier_id: item.resolved_supplier_id(),
                order_status: Some(order.status),
                role_context: RoleContext::Buyer,
                context_section: "mis_pedidos".into(),
                title: "Pedido creado".into(),
                body: "Tu pedido fue creado y espera confirmacion".into(),
                metadata: json!({ "quantity": item.quantity }),
                is_read: false,
                created_at: chrono::Utc::now(),
            };
            self.emit(notification).await;
        }

        let mut seen: HashSet<Uuid> = HashSet::new();
        for item in &order.items {
            let Some(supplier_id) = item.resolved_supplier_id() else {
                continue;
            };
            if !seen.insert(supplier_id) {
                continue;
            }
            let notification = Notification {
                id: Uuid::new_v4(),
                user_id: supplier_id,
                notification_type: NotificationType::OrderNew,
                order_id: order.id,
                product_id: None,
                supplier_id: Some(supplier_id),
                order_status: Some(order.status),
                role_context: RoleContext::Supplier,
                context_section: "mis_ventas".into(),
                title: "Nueva venta".into(),
                body: "Tienes un nuevo pedido pendiente de confirmacion".into(),
                metadata: json!({ "buyer_id": order.buyer_id }),
                is_read: false,
                created_at: chrono::Utc::now(),
            };
            self.emit(notification).await;
        }
    }

    /// Delivers one notification, logging and swallowing any failure.
    async fn emit(&self, notification: Notification) {
        let id = notification.id;
        let order_id = notification.order_id;
        if let Err(err) = self.rpc.deliver(notification).await {
            warn!(
                notification_id = %id,
                order_id = %order_id,
                error = %err,
                "notification delivery failed, dropping"
            );
            metrics::counter!("ordersync_notifications_dropped_total", 1);
        } else {
            metrics::counter!("ordersync_notifications_sent_total", 1);
        }
    }
}
