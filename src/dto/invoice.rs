use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{invoice, InvoiceStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub work_order_id: Option<String>,
    pub customer_id: Option<String>,
    #[schema(value_type = String, example = "250.00")]
    pub total: Decimal,
    pub due_at: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    /// draft, sent, paid or void
    pub status: Option<String>,
    #[schema(value_type = Option<String>)]
    pub total: Option<Decimal>,
    pub due_at: Option<DateTime<Utc>>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: String,
    pub number: String,
    pub work_order_id: Option<String>,
    pub customer_id: Option<String>,
    pub status: InvoiceStatus,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub issued_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<invoice::Model> for InvoiceResponse {
    fn from(model: invoice::Model) -> Self {
        Self {
            status: model.status(),
            id: model.id,
            number: model.number,
            work_order_id: model.work_order_id,
            customer_id: model.customer_id,
            total: model.total,
            issued_at: model.issued_at,
            due_at: model.due_at,
            paid_at: model.paid_at,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
