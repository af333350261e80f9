use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Void,
}

impl InvoiceStatus {
    /// draft -> sent -> paid, and anything not yet paid may be voided.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Draft, Sent) | (Sent, Paid) | (Draft, Paid) => true,
            (Draft | Sent, Void) => true,
            _ => false,
        }
    }

    pub fn is_deletable(self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Void)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub number: String,
    pub work_order_id: Option<String>,
    pub customer_id: Option<String>,
    pub status: String,
    pub total: Decimal,
    pub issued_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::work_order::Entity",
        from = "Column::WorkOrderId",
        to = "super::work_order::Column::Id"
    )]
    WorkOrder,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
}

impl Related<super::work_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkOrder.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> InvoiceStatus {
        self.status.parse().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::InvoiceStatus::*;

    #[test]
    fn invoice_status_transitions() {
        assert!(Draft.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Paid));
        assert!(Sent.can_transition_to(Void));
        assert!(!Paid.can_transition_to(Void));
        assert!(!Void.can_transition_to(Draft));
        assert!(!Sent.can_transition_to(Draft));
        assert!(Draft.is_deletable());
        assert!(!Paid.is_deletable());
    }
}
