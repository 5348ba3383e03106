//! Discovery, Like and Block API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{json_body, user, user_at, TestApp};

fn ids(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_discover_filters_by_distance_and_skips_liked_and_blocked() {
    let app = TestApp::new().await;
    let mut requester = user_at(1, 37.5665, 126.9780);
    requester.preferences.max_distance_km = Some(100.0);
    app.add_user(requester);
    app.add_user(user_at(2, 37.5700, 126.9800));
    app.add_user(user_at(3, 37.4563, 126.7052));
    app.add_user(user_at(4, 37.5670, 126.9790));
    app.add_user(user_at(5, 37.5668, 126.9785));
    app.add_user(user_at(6, 35.1796, 129.0756));

    let response = app.post_as(1, "/api/v1/blocks/4").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = app
        .post_json_as(1, "/api/v1/likes/5", json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.get_as(1, "/api/v1/discover").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(ids(&body), vec!["2", "3"]);
    let first = body[0]["distance_km"].as_f64().unwrap();
    let second = body[1]["distance_km"].as_f64().unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn test_discover_hides_users_who_blocked_the_requester() {
    let app = TestApp::new().await;
    app.add_user(user(1));
    app.add_user(user(2));
    app.add_user(user(3));

    app.post_as(3, "/api/v1/blocks/1").await;

    let body = json_body(app.get_as(1, "/api/v1/discover").await).await;
    assert_eq!(ids(&body), vec!["2"]);
}

#[tokio::test]
async fn test_discover_for_unknown_requester_is_not_found() {
    let app = TestApp::new().await;

    let response = app.get_as(42, "/api/v1/discover").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mutual_like_creates_one_match() {
    let app = TestApp::new().await;
    app.add_user(user(1));
    app.add_user(user(2));

    let response = app.post_json_as(1, "/api/v1/likes/2", json!({})).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["is_match"], false);
    assert!(body.get("match_id").is_none());

    let response = app.post_json_as(2, "/api/v1/likes/1", json!({})).await;
    let body = json_body(response).await;
    assert_eq!(body["is_match"], true);
    let match_id = body["match_id"].as_str().unwrap().to_string();
    assert_eq!(app.store.match_count(), 1);

    for viewer in [1, 2] {
        let body = json_body(app.get_as(viewer, "/api/v1/matches").await).await;
        let listed = body.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["id"], match_id.as_str());
        assert_eq!(listed[0]["is_active"], true);
    }

    let body = json_body(
        app.get_as(1, &format!("/api/v1/matches/{}", match_id))
            .await,
    )
    .await;
    assert_eq!(body["other_user"]["id"], "2");
}

#[tokio::test]
async fn test_duplicate_like_conflicts() {
    let app = TestApp::new().await;
    app.add_user(user(1));
    app.add_user(user(2));

    app.post_json_as(1, "/api/v1/likes/2", json!({})).await;
    let response = app
        .post_json_as(1, "/api/v1/likes/2", json!({"is_super": true}))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], 10005);
}

#[tokio::test]
async fn test_like_rejections() {
    let app = TestApp::new().await;
    app.add_user(user(1));
    app.add_user(user(2));

    let own = app.post_json_as(1, "/api/v1/likes/1", json!({})).await;
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);

    let missing = app.post_json_as(1, "/api/v1/likes/99", json!({})).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let malformed = app.post_json_as(1, "/api/v1/likes/abc", json!({})).await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    app.post_as(2, "/api/v1/blocks/1").await;
    let blocked = app.post_json_as(1, "/api/v1/likes/2", json!({})).await;
    assert_eq!(blocked.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_dislike_records_nothing() {
    let app = TestApp::new().await;
    app.add_user(user(1));
    app.add_user(user(2));

    let response = app.post_as(1, "/api/v1/dislikes/2").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = json_body(app.get_as(1, "/api/v1/discover").await).await;
    assert_eq!(ids(&body), vec!["2"]);
}

#[tokio::test]
async fn test_block_deactivates_match_and_unblock_keeps_it_inactive() {
    let app = TestApp::new().await;
    app.add_user(user(1));
    app.add_user(user(2));
    let match_id = app.create_match(1, 2).await;

    let response = app.post_as(1, "/api/v1/blocks/2").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["blocked_id"], "2");

    let again = app.post_as(1, "/api/v1/blocks/2").await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let matches = json_body(app.get_as(2, "/api/v1/matches").await).await;
    assert!(matches.as_array().unwrap().is_empty());

    let send = app
        .post_json_as(
            2,
            &format!("/api/v1/matches/{}/messages", match_id),
            json!({"content": "hello?"}),
        )
        .await;
    assert_eq!(send.status(), StatusCode::CONFLICT);

    let listed = json_body(app.get_as(1, "/api/v1/blocks").await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = app.delete_as(1, "/api/v1/blocks/2").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.delete_as(1, "/api/v1/blocks/2").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json_body(
        app.get_as(1, &format!("/api/v1/matches/{}", match_id))
            .await,
    )
    .await;
    assert_eq!(body["is_active"], false);
}

#[tokio::test]
async fn test_unmatch_is_limited_to_participants() {
    let app = TestApp::new().await;
    for id in [1, 2, 3] {
        app.add_user(user(id));
    }
    let match_id = app.create_match(1, 2).await;
    let uri = format!("/api/v1/matches/{}/unmatch", match_id);

    let outsider = app.post_as(3, &uri).await;
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);

    let response = app.post_as(2, &uri).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = json_body(app.get_as(1, "/api/v1/matches").await).await;
    assert!(body.as_array().unwrap().is_empty());
}
