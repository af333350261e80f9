use crate::{
    auth::AuthUser,
    dto::{CreateWorkOrderRequest, UpdateWorkOrderRequest, WorkOrderResponse},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, validate_input, PaginatedResponse, PaginationParams},
    services::work_orders::WorkOrderFilter,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use tracing::instrument;

#[utoipa::path(
    get,
    path = "/api/v1/work-orders",
    summary = "List work orders",
    description = "Paginated work orders, newest first, with optional filters",
    params(WorkOrderFilter, PaginationParams),
    responses(
        (status = 200, description = "Work orders retrieved", body = PaginatedResponse<WorkOrderResponse>),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "work-orders"
)]
#[instrument(skip(state))]
pub async fn list_work_orders(
    State(state): State<AppState>,
    Query(filter): Query<WorkOrderFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<WorkOrderResponse>>, ServiceError> {
    let (orders, total) = state
        .services
        .work_orders
        .list_work_orders(filter, pagination.page, pagination.per_page)
        .await?;
    let data = orders.into_iter().map(WorkOrderResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, pagination, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}",
    summary = "Get work order",
    description = "A single work order with its notes and resources",
    params(("id" = String, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Work order retrieved", body = WorkOrderResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "work-orders"
)]
pub async fn get_work_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrderResponse>, ServiceError> {
    Ok(Json(
        state.services.work_orders.get_work_order_detail(&id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders",
    summary = "Create work order",
    description = "Creates a work order. A draft invoice is created with it when customerId is set. Connected event streams receive work-order-created.",
    request_body = CreateWorkOrderRequest,
    responses(
        (status = 201, description = "Work order created", body = WorkOrderResponse),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Id already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "work-orders"
)]
#[instrument(skip(state, request), fields(user = %auth_user.user_id))]
pub async fn create_work_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateWorkOrderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&request)?;
    let created = state
        .services
        .work_orders
        .create_work_order(request, Some(auth_user.user_id))
        .await?;
    Ok(created_response(created))
}

#[utoipa::path(
    put,
    path = "/api/v1/work-orders/{id}",
    summary = "Update work order",
    description = "Partial update; absent fields are unchanged. Connected event streams receive work-order-updated.",
    params(("id" = String, Path, description = "Work order id")),
    request_body = UpdateWorkOrderRequest,
    responses(
        (status = 200, description = "Work order updated", body = WorkOrderResponse),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "work-orders"
)]
#[instrument(skip(state, request), fields(user = %auth_user.user_id))]
pub async fn update_work_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateWorkOrderRequest>,
) -> Result<Json<WorkOrderResponse>, ServiceError> {
    validate_input(&request)?;
    Ok(Json(
        state
            .services
            .work_orders
            .update_work_order(&id, request, &auth_user)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/work-orders/{id}",
    summary = "Delete work order",
    description = "Deletes the order with its notes and resources. Connected event streams receive work-order-deleted with the id.",
    params(("id" = String, Path, description = "Work order id")),
    responses(
        (status = 204, description = "Work order deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "work-orders"
)]
#[instrument(skip(state))]
pub async fn delete_work_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.work_orders.delete_work_order(&id).await?;
    Ok(no_content_response())
}
