//! Typing notifications and the SSE stream of group events.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use tokio::sync::broadcast;

use groupchat_core::chat::TypingIndicatorRequest;
use groupchat_core::events::ChatEvent;

use crate::{handlers::AppError, state::AppState};

/// Notify a group that a user is typing (POST /api/groups/{group_id}/typing).
///
/// Nothing is stored; the event is returned as delivered to subscribers.
pub async fn typing_indicator(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(payload): Json<TypingIndicatorRequest>,
) -> Result<Json<ChatEvent>, AppError> {
    let event = state.service.typing_indicator(&group_id, payload).await?;
    Ok(Json(event))
}

/// SSE endpoint for group events (GET /api/groups/{group_id}/events).
///
/// Streams `messageSent` and `typing` events until the client disconnects or
/// the server shuts down.
pub async fn events_sse(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mut receiver = state.service.subscribe(&group_id).await?;

    // Subscribe to shutdown signal
    let mut shutdown_rx = state.subscribe_shutdown();

    tracing::debug!(%group_id, "SSE subscriber connected");

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                result = receiver.recv() => {
                    match result {
                        Ok(event) => {
                            let event_data = serde_json::to_string(&event).unwrap_or_default();
                            yield Ok(Event::default()
                                .event(event.event_type())
                                .data(event_data));
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(%group_id, lagged = n, "SSE subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!(%group_id, "Event channel closed");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!(%group_id, "SSE session received shutdown signal");
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
