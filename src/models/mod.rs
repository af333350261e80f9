pub mod customer;
pub mod invoice;
pub mod provider;
pub mod user;
pub mod work_order;
pub mod work_order_note;
pub mod work_order_resource;

pub use invoice::InvoiceStatus;
pub use user::UserRole;
pub use work_order::{WorkOrderPriority, WorkOrderStatus};
