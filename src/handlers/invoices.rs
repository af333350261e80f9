use crate::{
    dto::{CreateInvoiceRequest, InvoiceResponse, UpdateInvoiceRequest},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, validate_input, PaginatedResponse, PaginationParams},
    services::invoices::InvoiceFilter,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(filter): Query<InvoiceFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<InvoiceResponse>>, ServiceError> {
    let (invoices, total) = state
        .services
        .invoices
        .list_invoices(filter, pagination.page, pagination.per_page)
        .await?;
    let data = invoices.into_iter().map(InvoiceResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, pagination, total)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvoiceResponse>, ServiceError> {
    Ok(Json(state.services.invoices.get_invoice(&id).await?.into()))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&request)?;
    let invoice = state.services.invoices.create_invoice(request).await?;
    Ok(created_response(InvoiceResponse::from(invoice)))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, ServiceError> {
    validate_input(&request)?;
    Ok(Json(
        state
            .services
            .invoices
            .update_invoice(&id, request)
            .await?
            .into(),
    ))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.invoices.delete_invoice(&id).await?;
    Ok(no_content_response())
}
