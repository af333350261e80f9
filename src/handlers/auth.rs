use crate::{
    auth::AuthUser,
    dto::{LoginRequest, TokenResponse, UserResponse},
    errors::ServiceError,
    handlers::common::validate_input,
    AppState,
};
use axum::{extract::State, Json};
use tracing::{info, warn};

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Log in",
    description = "Exchanges email and password for a bearer token",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ServiceError> {
    validate_input(&request)?;
    let user = state
        .auth
        .authenticate(&request.email, &request.password)
        .await
        .map_err(|e| {
            warn!(email = %request.email, "login failed");
            e
        })?;
    let token = state.auth.generate_token(&user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(token))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    summary = "Current user",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UserResponse>, ServiceError> {
    let user = state.services.users.get_user(&auth_user.user_id).await?;
    Ok(Json(user.into()))
}
