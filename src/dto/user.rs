use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::validate_not_blank;
use crate::models::{user, UserRole};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub name: String,
    #[validate(length(min = 8, max = 256))]
    pub password: String,
    /// admin, dispatcher or technician
    pub role: String,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(min = 8, max = 256))]
    pub password: Option<String>,
    pub role: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            role: model.role(),
            id: model.id,
            email: model.email,
            name: model.name,
            phone: model.phone,
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
