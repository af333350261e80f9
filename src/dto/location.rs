use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A GPS fix reported by a technician's device.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Meters
    #[validate(range(min = 0.0, max = 100000.0))]
    pub accuracy: Option<f64>,
    /// Degrees from north
    #[validate(range(min = 0.0, max = 360.0))]
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub user_id: String,
    pub user_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}
