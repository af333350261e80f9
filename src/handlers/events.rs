use crate::{
    auth::AuthUser,
    events::{EventFrame, Subscription},
    AppState,
};
use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::{stream, Stream};
use std::convert::Infallible;
use tracing::info;

fn to_sse(frame: EventFrame) -> SseEvent {
    SseEvent::default()
        .event(frame.name())
        .id(frame.seq.to_string())
        .data(frame.data.as_ref())
}

/// Work order event stream.
///
/// Frames are named `work-order-created`, `work-order-updated` and
/// `work-order-deleted`; `id:` is a process-wide sequence number. Missed
/// frames are not replayed, so `Last-Event-ID` is ignored.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    summary = "Subscribe to work order events",
    description = "Server-sent events. Authenticate with a bearer header or the access_token query parameter.",
    params(("access_token" = Option<String>, Query, description = "Bearer token for clients that cannot set headers")),
    responses(
        (status = 200, description = "text/event-stream of work order events", content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "events"
)]
pub async fn stream_events(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = state.events.subscribe();
    info!(
        subscriber = %subscription.id(),
        user_id = %auth_user.user_id,
        "event stream opened"
    );

    // The subscription lives inside the stream; axum drops the stream when
    // the client disconnects, which deregisters it.
    let frames = stream::unfold(subscription, |mut subscription: Subscription| async move {
        subscription
            .recv()
            .await
            .map(|frame| (Ok::<_, Infallible>(to_sse(frame)), subscription))
    });

    Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(state.config.sse_keep_alive())
            .text("keep-alive"),
    )
}
