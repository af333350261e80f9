use crate::{
    auth::AuthUser,
    dto::{LocationResponse, LocationUpdate},
    errors::ServiceError,
    handlers::common::validate_input,
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};

/// Records the caller's current position.
pub async fn report_location(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(update): Json<LocationUpdate>,
) -> Result<Json<LocationResponse>, ServiceError> {
    validate_input(&update)?;
    Ok(Json(state.services.locations.report(&auth_user, update)))
}

pub async fn list_locations(State(state): State<AppState>) -> Json<Vec<LocationResponse>> {
    Json(state.services.locations.list())
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<LocationResponse>, ServiceError> {
    state
        .services
        .locations
        .get(&user_id)
        .map(Json)
        .ok_or_else(|| ServiceError::not_found("Location for user", &user_id))
}
