use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::validate_not_blank;
use crate::models::work_order_note;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, max = 2000), custom = "validate_not_blank")]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub id: String,
    pub work_order_id: String,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<work_order_note::Model> for NoteResponse {
    fn from(model: work_order_note::Model) -> Self {
        Self {
            id: model.id,
            work_order_id: model.work_order_id,
            author_id: model.author_id,
            author_name: model.author_name,
            body: model.body,
            created_at: model.created_at,
        }
    }
}
