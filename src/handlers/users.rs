use crate::{
    auth::AuthUser,
    dto::{CreateUserRequest, UpdateUserRequest, UserResponse},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, validate_input, PaginatedResponse, PaginationParams},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};

pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ServiceError> {
    let (users, total) = state
        .services
        .users
        .list_users(pagination.page, pagination.per_page)
        .await?;
    let data = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, pagination, total)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ServiceError> {
    Ok(Json(state.services.users.get_user(&id).await?.into()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&request)?;
    let user = state.services.users.create_user(request).await?;
    Ok(created_response(UserResponse::from(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ServiceError> {
    validate_input(&request)?;
    Ok(Json(
        state.services.users.update_user(&id, request).await?.into(),
    ))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    if auth_user.user_id == id {
        return Err(ServiceError::InvalidOperation(
            "you cannot delete your own account".into(),
        ));
    }
    state.services.users.delete_user(&id).await?;
    Ok(no_content_response())
}
