//! Block Handlers

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::response::BlockResponse;
use crate::presentation::http::extractors::PathId;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Users blocked by the current user
pub async fn list_blocked(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<BlockResponse>>, AppError> {
    let blocks = state.matches.list_blocked(auth.user_id).await?;
    Ok(Json(blocks))
}

/// Block a user
pub async fn block(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(user_id): PathId,
) -> Result<(StatusCode, Json<BlockResponse>), AppError> {
    let block = state.matches.block(auth.user_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(block)))
}

/// Remove a block
pub async fn unblock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(user_id): PathId,
) -> Result<StatusCode, AppError> {
    state.matches.unblock(auth.user_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
