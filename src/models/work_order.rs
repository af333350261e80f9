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
pub enum WorkOrderStatus {
    #[default]
    Scheduled,
    Dispatched,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkOrderPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A schedulable unit of field work. `technician_ids` holds a JSON array
/// of user ids; use [`Model::technician_ids`] and [`pack_technician_ids`]
/// rather than touching the column text directly.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub customer_id: Option<String>,
    pub provider_id: Option<String>,
    pub address: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Text")]
    pub technician_ids: String,
    pub price: Decimal,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::provider::Entity",
        from = "Column::ProviderId",
        to = "super::provider::Column::Id"
    )]
    Provider,
    #[sea_orm(has_many = "super::work_order_note::Entity")]
    Notes,
    #[sea_orm(has_many = "super::work_order_resource::Entity")]
    Resources,
    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::provider::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl Related<super::work_order_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notes.def()
    }
}

impl Related<super::work_order_resource::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Resources.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Unpacks the technician assignment column. A corrupt value reads as
    /// "nobody assigned" instead of failing the whole request.
    pub fn technician_ids(&self) -> Vec<String> {
        unpack_technician_ids(&self.technician_ids)
    }

    pub fn status(&self) -> WorkOrderStatus {
        self.status.parse().unwrap_or_default()
    }

    pub fn priority(&self) -> WorkOrderPriority {
        self.priority.parse().unwrap_or_default()
    }

    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.technician_ids().iter().any(|id| id == user_id)
    }
}

/// Serializes an assignment list into its column form, dropping blanks and
/// duplicates while keeping the caller's order.
pub fn pack_technician_ids(ids: &[String]) -> String {
    let mut seen = std::collections::HashSet::new();
    let cleaned: Vec<&str> = ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .collect();
    serde_json::to_string(&cleaned).unwrap_or_else(|_| "[]".to_string())
}

pub fn unpack_technician_ids(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable technician_ids column, treating as empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn technician_ids_pack_and_unpack() {
        let packed = pack_technician_ids(&[
            "u1".to_string(),
            " u2 ".to_string(),
            "".to_string(),
            "u1".to_string(),
        ]);
        assert_eq!(packed, r#"["u1","u2"]"#);
        assert_eq!(unpack_technician_ids(&packed), vec!["u1", "u2"]);
        assert!(unpack_technician_ids("not json").is_empty());
    }

    #[test]
    fn status_and_priority_use_snake_case_values() {
        assert_eq!(WorkOrderStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            "on_hold".parse::<WorkOrderStatus>().unwrap(),
            WorkOrderStatus::OnHold
        );
        assert!("done".parse::<WorkOrderStatus>().is_err());
        assert!(WorkOrderPriority::Urgent > WorkOrderPriority::High);
        assert_eq!(WorkOrderPriority::default().as_ref(), "normal");
    }
}
