//! Chat Handlers
//!
//! HTTP counterparts of the gateway chat operations. Events go out through
//! the same bus, so websocket clients see messages sent over HTTP.

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{HistoryQuery, SendMessageRequest};
use crate::application::dto::response::{MessageResponse, UnreadCountResponse};
use crate::presentation::http::extractors::PathId;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Message history of a match, newest first
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(match_id): PathId,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    validate(&query)?;

    let messages = state
        .chat
        .message_history(match_id, auth.user_id, query)
        .await?;
    Ok(Json(messages))
}

/// Send a message to a match
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(match_id): PathId,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    validate(&body)?;

    let message = state.chat.send_message(match_id, auth.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Signal that the current user is typing
pub async fn typing(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(match_id): PathId,
) -> Result<StatusCode, AppError> {
    state.chat.typing(match_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a message read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    PathId(message_id): PathId,
) -> Result<Json<MessageResponse>, AppError> {
    let message = state.chat.mark_read(message_id, auth.user_id).await?;
    Ok(Json(message))
}

/// Unread messages addressed to the current user
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let count = state.chat.unread_count(auth.user_id).await?;
    Ok(Json(count))
}
