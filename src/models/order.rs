use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an order.
///
/// The linear progression is `pending → accepted → in_transit → delivered`.
/// `rejected` is reachable only from `pending`; `cancelled` is reachable from
/// any non-terminal state. Transition rules live in
/// [`crate::services::transition`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    InTransit,
    Delivered,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    /// Position in the linear forward ordering. Terminal-by-exception states
    /// (`rejected`, `cancelled`) carry no rank.
    pub fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Accepted => Some(1),
            OrderStatus::InTransit => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Rejected | OrderStatus::Cancelled => None,
        }
    }

    /// No further transitions are allowed out of a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    /// Statuses that require a confirmed payment before they can be entered.
    pub fn is_payment_gated(self) -> bool {
        matches!(
            self,
            OrderStatus::Accepted | OrderStatus::InTransit | OrderStatus::Delivered
        )
    }

    /// Human-readable (Spanish) name used by the UI projection.
    pub fn display_name(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pendiente",
            OrderStatus::Accepted => "Aceptado",
            OrderStatus::Rejected => "Rechazado",
            OrderStatus::InTransit => "En Transito",
            OrderStatus::Delivered => "Entregado",
            OrderStatus::Cancelled => "Cancelado",
        }
    }

    /// Reverse of [`OrderStatus::display_name`]; accepts backend names too so
    /// filter strings round-trip regardless of which form the caller holds.
    pub fn from_display(name: &str) -> Option<Self> {
        match name {
            "Pendiente" => Some(OrderStatus::Pending),
            "Aceptado" => Some(OrderStatus::Accepted),
            "Rechazado" => Some(OrderStatus::Rejected),
            "En Transito" | "En Ruta" => Some(OrderStatus::InTransit),
            "Entregado" => Some(OrderStatus::Delivered),
            "Cancelado" => Some(OrderStatus::Cancelled),
            other => other.parse().ok(),
        }
    }
}

/// Payment confirmation state, owned by the payment flow and only read here.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
    Rejected,
}

/// Tax document requested for a line item.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentType {
    Boleta,
    Factura,
    None,
}

/// Minimal product projection embedded in legacy line items. Older rows only
/// carry the supplier through this nested shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    pub supplier_id: Option<Uuid>,
    pub name: Option<String>,
}

/// One product line within an order. Items never exist outside their order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub financing_amount: Option<Decimal>,
    pub document_type: DocumentType,
    /// Absent on legacy records; resolution falls back to the embedded product.
    pub supplier_id: Option<Uuid>,
    pub product: Option<ProductRef>,
    // Offer metadata must survive every mapping step unchanged.
    pub is_offered: bool,
    pub offer_id: Option<Uuid>,
    pub offered_price: Option<Decimal>,
}

impl OrderItem {
    /// Resolves the owning supplier, falling through the possible field
    /// locations schema drift has left behind.
    pub fn resolved_supplier_id(&self) -> Option<Uuid> {
        self.supplier_id
            .or_else(|| self.product.as_ref().and_then(|p| p.supplier_id))
    }

    pub fn line_subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A purchase order. Orders are created at checkout completion and mutated
/// only through the resolution chain; they are never physically deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub status: OrderStatus,
    /// `None` on legacy cart-derived rows, whose schema predates payments.
    pub payment_status: Option<PaymentStatus>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_amount: Decimal,
    pub payment_method: Option<String>,
    pub payment_rejection_reason: Option<String>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// An order is late when its delivery deadline has passed and it is still
    /// in flight. Falls back to `created_at` when no estimate was recorded.
    pub fn is_late(&self, now: DateTime<Utc>) -> bool {
        let deadline = self.estimated_delivery_date.unwrap_or(self.created_at);
        now > deadline
            && !matches!(
                self.status,
                OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Rejected
            )
    }

    /// Short display code shown to buyers (`K` prefix).
    pub fn display_code(&self) -> String {
        short_code(&self.id.to_string(), 'K')
    }
}

/// Deterministic short code: base36 over the first ten hex digits of the id.
/// Stable for display purposes only, not a secure identifier.
pub fn short_code(raw_id: &str, prefix: char) -> String {
    let hex: String = raw_id
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(10)
        .collect();
    let mut num = u64::from_str_radix(&hex, 16).unwrap_or(0);
    if num == 0 {
        return format!("{prefix}0");
    }
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut out = String::new();
    while num > 0 {
        out.push(DIGITS[(num % 36) as usize] as char);
        num /= 36;
    }
    out.push(prefix);
    out.chars().rev().collect()
}
