use crate::{
    auth::AuthUser,
    dto::{CreateNoteRequest, NoteResponse},
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, validate_input},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};

#[utoipa::path(
    get,
    path = "/api/v1/work-orders/{id}/notes",
    summary = "List notes",
    params(("id" = String, Path, description = "Work order id")),
    responses(
        (status = 200, description = "Notes, newest first", body = Vec<NoteResponse>),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "notes"
)]
pub async fn list_notes(
    State(state): State<AppState>,
    Path(work_order_id): Path<String>,
) -> Result<Json<Vec<NoteResponse>>, ServiceError> {
    let notes = state.services.notes.list_notes(&work_order_id).await?;
    Ok(Json(notes.into_iter().map(NoteResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/v1/work-orders/{id}/notes",
    summary = "Add note",
    params(("id" = String, Path, description = "Work order id")),
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note added", body = NoteResponse),
        (status = 400, description = "Empty or oversized body", body = crate::errors::ErrorResponse),
        (status = 404, description = "Work order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "notes"
)]
pub async fn add_note(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(work_order_id): Path<String>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&request)?;
    let note = state
        .services
        .notes
        .add_note(&work_order_id, request, &auth_user)
        .await?;
    Ok(created_response(NoteResponse::from(note)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/work-orders/{id}/notes/{note_id}",
    summary = "Delete note",
    params(
        ("id" = String, Path, description = "Work order id"),
        ("note_id" = String, Path, description = "Note id"),
    ),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 403, description = "Not the author", body = crate::errors::ErrorResponse),
        (status = 404, description = "Note not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "notes"
)]
pub async fn delete_note(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((work_order_id, note_id)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    state
        .services
        .notes
        .delete_note(&work_order_id, &note_id, &auth_user)
        .await?;
    Ok(no_content_response())
}
