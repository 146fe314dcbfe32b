pub mod notification;
pub mod order;
pub mod part;

pub use notification::{Notification, NotificationType, RoleContext};
pub use order::{short_code, DocumentType, Order, OrderItem, OrderStatus, PaymentStatus, ProductRef};
pub use part::SupplierPart;
