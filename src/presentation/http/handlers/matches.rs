//! Like and Match Handlers

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::LikeRequest;
use crate::application::dto::response::{LikeResponse, MatchResponse};
use crate::presentation::http::extractors::PathId;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Like a user. The response says whether the like completed a match.
pub async fn like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(user_id): PathId,
    Json(body): Json<LikeRequest>,
) -> Result<(StatusCode, Json<LikeResponse>), AppError> {
    let result = state
        .matches
        .like(auth.user_id, user_id, body.is_super)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Pass on a user
pub async fn dislike(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(user_id): PathId,
) -> Result<StatusCode, AppError> {
    state.matches.dislike(auth.user_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Active matches of the current user
pub async fn list_matches(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<MatchResponse>>, AppError> {
    let matches = state.matches.list_matches(auth.user_id).await?;
    Ok(Json(matches))
}

/// Get a match by ID
pub async fn get_match(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(match_id): PathId,
) -> Result<Json<MatchResponse>, AppError> {
    let found = state.matches.get_match(match_id, auth.user_id).await?;
    Ok(Json(found))
}

/// Deactivate a match
pub async fn unmatch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(match_id): PathId,
) -> Result<StatusCode, AppError> {
    state.matches.unmatch(match_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
