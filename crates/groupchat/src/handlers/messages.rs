//! Message handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use groupchat_core::chat::{Message, PageQuery, SendMessageRequest};
use groupchat_core::storage::Page;

use crate::{handlers::AppError, state::AppState};

/// Post a message to a group (POST /api/groups/{group_id}/messages).
pub async fn send_message(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = state.service.send_message(&group_id, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Messages of a group, oldest first (GET /api/groups/{group_id}/messages).
pub async fn list_messages(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Message>>, AppError> {
    let messages = state.service.messages_per_group(&group_id, &page).await?;
    Ok(Json(messages))
}
