//! Group handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use groupchat_core::chat::{AddUserToGroupRequest, CreateGroupRequest, Group};

use crate::{handlers::AppError, state::AppState};

/// Create a group owned by its creator (POST /api/groups).
pub async fn create_group(
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = state.service.create_group(payload).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Get a single group by ID (GET /api/groups/{group_id}).
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<Group>, AppError> {
    Ok(Json(state.service.get_group(&group_id).await?))
}

/// Add a user to a group (POST /api/groups/{group_id}/members).
pub async fn add_user_to_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(payload): Json<AddUserToGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let membership = state
        .service
        .add_user_to_group(&group_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(membership)))
}
