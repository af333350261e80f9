use crate::{
    dto::{CreateProviderRequest, ProviderResponse, UpdateProviderRequest},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, validate_input, PaginatedResponse, PaginationParams},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};

pub async fn list_providers(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<ProviderResponse>>, ServiceError> {
    let (providers, total) = state
        .services
        .providers
        .list_providers(pagination.page, pagination.per_page)
        .await?;
    let data = providers.into_iter().map(ProviderResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, pagination, total)))
}

pub async fn get_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProviderResponse>, ServiceError> {
    let provider = state.services.providers.get_provider(&id).await?;
    Ok(Json(provider.into()))
}

pub async fn create_provider(
    State(state): State<AppState>,
    Json(request): Json<CreateProviderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&request)?;
    let provider = state.services.providers.create_provider(request).await?;
    Ok(created_response(ProviderResponse::from(provider)))
}

pub async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateProviderRequest>,
) -> Result<Json<ProviderResponse>, ServiceError> {
    validate_input(&request)?;
    let provider = state
        .services
        .providers
        .update_provider(&id, request)
        .await?;
    Ok(Json(provider.into()))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.providers.delete_provider(&id).await?;
    Ok(no_content_response())
}
