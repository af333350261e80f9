use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::work_order_resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    pub id: String,
    pub work_order_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub client_token: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Download path relative to the API root
    pub url: String,
}

pub fn resource_url(work_order_id: &str, resource_id: &str) -> String {
    format!(
        "/api/v1/work-orders/{}/resources/{}/file",
        work_order_id, resource_id
    )
}

impl From<work_order_resource::Model> for ResourceResponse {
    fn from(model: work_order_resource::Model) -> Self {
        Self {
            url: resource_url(&model.work_order_id, &model.id),
            id: model.id,
            work_order_id: model.work_order_id,
            file_name: model.file_name,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            client_token: model.client_token,
            uploaded_by: model.uploaded_by,
            created_at: model.created_at,
        }
    }
}
