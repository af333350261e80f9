use crate::{
    auth::AuthUser,
    dto::ResourceResponse,
    errors::ServiceError,
    handlers::common::no_content_response,
    services::resources::{sanitize_file_name, NewUpload},
    AppState,
};
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn multipart_error(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge("upload exceeds the size limit".into())
    } else {
        ServiceError::BadRequest(err.body_text())
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}/resources",
    summary = "List resources",
    params(("id" = String, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Resources, newest first", body = Vec<ResourceResponse>),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "resources"
)]
pub async fn list_resources(
    State(state): State<AppState>,
    Path(work_order_id): Path<String>,
) -> Result<Json<Vec<ResourceResponse>>, ServiceError> {
    let resources = state
        .services
        .resources
        .list_resources(&work_order_id)
        .await?;
    Ok(Json(
        resources.into_iter().map(ResourceResponse::from).collect(),
    ))
}

/// Multipart fields: `file` (required) and `clientToken` (optional).
#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/resources",
    summary = "Upload resource",
    description = "Attaches a file. Repeating an upload with the same clientToken returns the first resource with 200 instead of 201.",
    params(("id" = String, Path, description = "Work order id")),
    request_body(content_type = "multipart/form-data", description = "file and optional clientToken"),
    responses(
        (status = 201, description = "Resource stored", body = ResourceResponse),
        (status = 200, description = "Duplicate clientToken, existing resource", body = ResourceResponse),
        (status = 400, description = "Missing file", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
        (status = 413, description = "File too large", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "resources"
)]
pub async fn upload_resource(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(work_order_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    let mut upload: Option<NewUpload> = None;
    let mut client_token: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                upload = Some(NewUpload {
                    file_name,
                    content_type,
                    data,
                    client_token: None,
                });
            }
            Some("clientToken") => {
                client_token = Some(field.text().await.map_err(multipart_error)?);
            }
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }

    let mut upload =
        upload.ok_or_else(|| ServiceError::BadRequest("multipart field 'file' is required".into()))?;
    upload.client_token = client_token;

    let stored = state
        .services
        .resources
        .upload(&work_order_id, upload, Some(auth_user.user_id))
        .await?;
    let status = if stored.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ResourceResponse::from(stored.resource))).into_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}/resources/{resource_id}/file",
    summary = "Download resource",
    params(
        ("id" = String, Path, description = "Work order id"),
        ("resource_id" = String, Path, description = "Resource id"),
    ),
    responses(
        (status = 200, description = "File contents"),
        (status = 404, description = "Resource not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "resources"
)]
pub async fn download_resource(
    State(state): State<AppState>,
    Path((work_order_id, resource_id)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    let (resource, data) = state
        .services
        .resources
        .read_file(&work_order_id, &resource_id)
        .await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_file_name(&resource.file_name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, resource.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/v1/work-orders/{id}/resources/{resource_id}",
    summary = "Delete resource",
    params(
        ("id" = String, Path, description = "Work order id"),
        ("resource_id" = String, Path, description = "Resource id"),
    ),
    responses(
        (status = 204, description = "Resource deleted"),
        (status = 404, description = "Resource not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "resources"
)]
pub async fn delete_resource(
    State(state): State<AppState>,
    Path((work_order_id, resource_id)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    state
        .services
        .resources
        .delete_resource(&work_order_id, &resource_id)
        .await?;
    Ok(no_content_response())
}
