//! Discovery Handlers

use axum::{
    extract::{Extension, State},
    Json,
};

use crate::application::dto::response::CandidateResponse;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Ranked candidates for the current user
pub async fn discover(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<CandidateResponse>>, AppError> {
    let candidates = state.discovery.discover(auth.user_id).await?;
    Ok(Json(candidates))
}
