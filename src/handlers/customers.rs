use crate::{
    dto::{CreateCustomerRequest, CustomerResponse, UpdateCustomerRequest},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, validate_input, PaginatedResponse, PaginationParams},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerSearch {
    pub search: Option<String>,
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(search): Query<CustomerSearch>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<CustomerResponse>>, ServiceError> {
    let (customers, total) = state
        .services
        .customers
        .list_customers(search.search.as_deref(), pagination.page, pagination.per_page)
        .await?;
    let data = customers.into_iter().map(CustomerResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, pagination, total)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CustomerResponse>, ServiceError> {
    let customer = state.services.customers.get_customer(&id).await?;
    Ok(Json(customer.into()))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&request)?;
    let customer = state.services.customers.create_customer(request).await?;
    Ok(created_response(CustomerResponse::from(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<Json<CustomerResponse>, ServiceError> {
    validate_input(&request)?;
    let customer = state
        .services
        .customers
        .update_customer(&id, request)
        .await?;
    Ok(Json(customer.into()))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.customers.delete_customer(&id).await?;
    Ok(no_content_response())
}
