use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::OrderStatus;

/// What a notification is about.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
    OrderNew,
    OrderStatus,
}

/// Which side of the marketplace the recipient is acting as.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoleContext {
    Buyer,
    Supplier,
}

/// An event delivered to one user about one order/item. Created server-side
/// per (order, item, recipient) tuple; only the read flag is mutated from the
/// client, through [`crate::services::read_state`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub order_status: Option<OrderStatus>,
    pub role_context: RoleContext,
    pub context_section: String,
    pub title: String,
    pub body: String,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
