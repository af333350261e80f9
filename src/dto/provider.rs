use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::validate_not_blank;
use crate::models::provider;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderRequest {
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub name: String,
    #[validate(length(max = 200))]
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProviderRequest {
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(length(max = 200))]
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    pub id: String,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<provider::Model> for ProviderResponse {
    fn from(model: provider::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            contact_name: model.contact_name,
            email: model.email,
            phone: model.phone,
            specialty: model.specialty,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
