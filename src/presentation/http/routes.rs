//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{auth_middleware, logging};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket gateway endpoint; the token arrives in Identify
        .route("/gateway", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(logging::track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes (all protected)
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/discover", get(handlers::discovery::discover))
        .route("/likes/{user_id}", post(handlers::matches::like))
        .route("/dislikes/{user_id}", post(handlers::matches::dislike))
        .nest("/matches", match_routes())
        .nest("/messages", message_routes())
        .nest("/blocks", block_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Match and conversation routes
fn match_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::matches::list_matches))
        .route("/{match_id}", get(handlers::matches::get_match))
        .route("/{match_id}/unmatch", post(handlers::matches::unmatch))
        .route(
            "/{match_id}/messages",
            get(handlers::chat::get_messages).post(handlers::chat::send_message),
        )
        .route("/{match_id}/typing", post(handlers::chat::typing))
}

/// Message routes
fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/unread", get(handlers::chat::unread_count))
        .route("/{message_id}/read", post(handlers::chat::mark_read))
}

/// Block routes
fn block_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::blocks::list_blocked))
        .route(
            "/{user_id}",
            post(handlers::blocks::block).delete(handlers::blocks::unblock),
        )
}
