//! Health Check API Tests
//!
//! Probes, metrics exposition and authentication on the protected API.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use crate::common::{json_body, text_body, TestApp};

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new().await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;

    let response = app.get("/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "alive");
}

#[tokio::test]
async fn test_readiness_omits_unused_backends() {
    let app = TestApp::new().await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["checks"].get("database").is_none());
    assert!(body["checks"].get("redis").is_none());
    assert_eq!(body["checks"]["websocket"]["active_connections"], 0);
}

#[tokio::test]
async fn test_metrics_exposes_request_counter() {
    let app = TestApp::new().await;
    app.get("/health").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = text_body(response).await;
    assert!(body.contains("matchmaker_http_requests_total"));
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/matches").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], 10003);
}

#[tokio::test]
async fn test_api_rejects_token_signed_with_other_secret() {
    let app = TestApp::new().await;
    let now = chrono::Utc::now().timestamp();
    let claims = matchmaker_server::presentation::middleware::Claims {
        sub: "1".into(),
        iat: now,
        exp: now + 60,
    };
    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"some-other-secret-of-enough-length"),
    )
    .unwrap();

    let response = app.get_with_token("/api/v1/matches", &forged).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
