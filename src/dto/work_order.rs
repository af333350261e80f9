use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::{validate_client_id, validate_not_blank, NoteResponse, ResourceResponse};
use crate::models::{work_order, WorkOrderPriority, WorkOrderStatus};

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("price");
        err.message = Some("price must not be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkOrderRequest {
    /// Optional client-chosen id; a UUID is generated otherwise
    #[validate(custom = "validate_client_id")]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    /// One of scheduled, dispatched, in_progress, on_hold, completed, cancelled
    pub status: Option<String>,
    /// One of low, normal, high, urgent
    pub priority: Option<String>,
    pub customer_id: Option<String>,
    pub provider_id: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub technician_ids: Vec<String>,
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<String>, example = "120.00")]
    pub price: Option<Decimal>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkOrderRequest {
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub customer_id: Option<String>,
    pub provider_id: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub technician_ids: Option<Vec<String>>,
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<String>, example = "95.50")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: WorkOrderStatus,
    pub priority: WorkOrderPriority,
    pub customer_id: Option<String>,
    pub provider_id: Option<String>,
    pub address: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub technician_ids: Vec<String>,
    #[schema(value_type = String, example = "120.00")]
    pub price: Decimal,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present on single-order reads and on pushed events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<NoteResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceResponse>>,
}

impl From<work_order::Model> for WorkOrderResponse {
    fn from(model: work_order::Model) -> Self {
        Self {
            technician_ids: model.technician_ids(),
            status: model.status(),
            priority: model.priority(),
            id: model.id,
            title: model.title,
            description: model.description,
            customer_id: model.customer_id,
            provider_id: model.provider_id,
            address: model.address,
            scheduled_start: model.scheduled_start,
            scheduled_end: model.scheduled_end,
            price: model.price,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
            notes: None,
            resources: None,
        }
    }
}

impl WorkOrderResponse {
    pub fn with_details(
        mut self,
        notes: Vec<NoteResponse>,
        resources: Vec<ResourceResponse>,
    ) -> Self {
        self.notes = Some(notes);
        self.resources = Some(resources);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn create_request_reads_camel_case() {
        let req: CreateWorkOrderRequest = serde_json::from_value(json!({
            "id": "wo42",
            "title": "Fix valve",
            "price": 120,
            "customerId": "c1",
            "technicianIds": ["u1"],
            "scheduledStart": "2024-05-01T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(req.price, Some(dec!(120)));
        assert_eq!(req.customer_id.as_deref(), Some("c1"));
        assert_eq!(req.technician_ids, vec!["u1"]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn negative_price_and_blank_title_are_rejected() {
        let req = CreateWorkOrderRequest {
            title: "   ".into(),
            price: Some(dec!(-1)),
            ..Default::default()
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(errors.field_errors().contains_key("price"));
    }
}
