//! Raw access-pattern reads.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use groupchat_core::chat::PageQuery;
use groupchat_core::storage::{Item, Page};

use crate::{handlers::AppError, state::AppState};

/// Run a named access pattern (GET /api/query/{pattern}/{id}).
///
/// Returns stored items as attribute maps. Unknown pattern names are 404.
pub async fn query_pattern(
    State(state): State<AppState>,
    Path((pattern, id)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Item>>, AppError> {
    let items = state.service.query_pattern(&pattern, &id, &page).await?;
    Ok(Json(items))
}
