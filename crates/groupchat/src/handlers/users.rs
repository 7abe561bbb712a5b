//! User account handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use groupchat_core::chat::{CreateUserAccountRequest, Group, PageQuery, User, UserGroup};
use groupchat_core::storage::Page;

use crate::{handlers::AppError, state::AppState};

/// Create a user account (POST /api/users).
pub async fn create_user_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.service.create_user_account(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a single user by ID (GET /api/users/{user_id}).
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.service.get_user(&user_id).await?))
}

/// Groups created by a user (GET /api/users/{user_id}/groups/created).
pub async fn groups_created_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Group>>, AppError> {
    let groups = state
        .service
        .groups_created_by_user(&user_id, &page)
        .await?;
    Ok(Json(groups))
}

/// Groups a user belongs to, with group details (GET /api/users/{user_id}/groups).
pub async fn groups_user_belongs_to(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<UserGroup>>, AppError> {
    let groups = state
        .service
        .groups_user_belongs_to(&user_id, &page)
        .await?;
    Ok(Json(groups))
}
