//! Chat API Tests

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use matchmaker_server::application::events::RealtimeEvent;

use crate::common::{json_body, user, TestApp};

async fn setup() -> (TestApp, String) {
    let app = TestApp::new().await;
    for id in [1, 2, 3] {
        app.add_user(user(id));
    }
    let match_id = app.create_match(1, 2).await;
    (app, match_id)
}

async fn send(app: &TestApp, sender: i64, match_id: &str, body: Value) -> axum::response::Response {
    app.post_json_as(sender, &format!("/api/v1/matches/{}/messages", match_id), body)
        .await
}

async fn unread(app: &TestApp, user_id: i64) -> i64 {
    let body = json_body(app.get_as(user_id, "/api/v1/messages/unread").await).await;
    body["unread"].as_i64().unwrap()
}

#[tokio::test]
async fn test_send_then_read_history_newest_first() {
    let (app, match_id) = setup().await;

    for content in ["one", "two", "three"] {
        let response = send(&app, 1, &match_id, json!({"content": content})).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let uri = format!("/api/v1/matches/{}/messages?limit=2", match_id);
    let page = json_body(app.get_as(2, &uri).await).await;
    let contents: Vec<&str> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["three", "two"]);

    let before = page[1]["id"].as_str().unwrap();
    let uri = format!("/api/v1/matches/{}/messages?before={}", match_id, before);
    let rest = json_body(app.get_as(2, &uri).await).await;
    assert_eq!(rest.as_array().unwrap().len(), 1);
    assert_eq!(rest[0]["content"], "one");
    assert_eq!(rest[0]["sender_id"], "1");
    assert_eq!(rest[0]["recipient_id"], "2");
}

#[tokio::test]
async fn test_history_limit_out_of_range() {
    let (app, match_id) = setup().await;

    let uri = format!("/api/v1/matches/{}/messages?limit=0", match_id);
    let response = app.get_as(1, &uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], 10007);
}

#[tokio::test]
async fn test_outsider_cannot_read_or_write() {
    let (app, match_id) = setup().await;

    let response = send(&app, 3, &match_id, json!({"content": "hi"})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let uri = format!("/api/v1/matches/{}/messages", match_id);
    let response = app.get_as(3, &uri).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_as(3, &format!("/api/v1/matches/{}/typing", match_id))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_message_body_rules() {
    let (app, match_id) = setup().await;

    let empty = send(&app, 1, &match_id, json!({"content": "   "})).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let bad_url = send(
        &app,
        1,
        &match_id,
        json!({"content": "look", "attachment_url": "not a url"}),
    )
    .await;
    assert_eq!(bad_url.status(), StatusCode::BAD_REQUEST);

    let attachment_only = send(
        &app,
        1,
        &match_id,
        json!({"attachment_url": "https://cdn.example.com/p/1.jpg"}),
    )
    .await;
    assert_eq!(attachment_only.status(), StatusCode::CREATED);
    let body = json_body(attachment_only).await;
    assert_eq!(body["content"], "");
    assert_eq!(body["attachment_url"], "https://cdn.example.com/p/1.jpg");

    let missing = send(&app, 1, "123456", json!({"content": "hi"})).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unmatched_conversation_is_read_only() {
    let (app, match_id) = setup().await;
    send(&app, 1, &match_id, json!({"content": "before"})).await;

    app.post_as(1, &format!("/api/v1/matches/{}/unmatch", match_id))
        .await;

    let response = send(&app, 2, &match_id, json!({"content": "after"})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let uri = format!("/api/v1/matches/{}/messages", match_id);
    let history = json_body(app.get_as(2, &uri).await).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mark_read_is_recipient_only_and_idempotent() {
    let (app, match_id) = setup().await;
    let sent = json_body(send(&app, 1, &match_id, json!({"content": "hey"})).await).await;
    let message_id = sent["id"].as_str().unwrap();
    let uri = format!("/api/v1/messages/{}/read", message_id);
    assert_eq!(unread(&app, 2).await, 1);

    let by_sender = app.post_as(1, &uri).await;
    assert_eq!(by_sender.status(), StatusCode::FORBIDDEN);

    let first = json_body(app.post_as(2, &uri).await).await;
    assert_eq!(first["is_read"], true);
    assert!(first["read_at"].is_string());
    assert_eq!(unread(&app, 2).await, 0);

    let response = app.post_as(2, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = json_body(response).await;
    assert_eq!(second["read_at"], first["read_at"]);

    let missing = app.post_as(2, "/api/v1/messages/987654/read").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sent_message_reaches_connected_recipient() {
    let (app, match_id) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connected = app.state.presence.connect(2, tx).await.unwrap();
    assert_eq!(connected.rooms.len(), 2);

    let response = send(&app, 1, &match_id, json!({"content": "ping"})).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut names = Vec::new();
    for _ in 0..2 {
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if let RealtimeEvent::NewMessage(e) = &event {
            assert_eq!(e.message.content, "ping");
        }
        names.push(event.event_name());
    }
    names.sort();
    assert_eq!(names, vec!["new_message", "new_message_notification"]);

    app.state
        .presence
        .disconnect(connected.connection_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_typing_skips_the_typist() {
    let (app, match_id) = setup().await;
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    app.state.presence.connect(1, tx1).await.unwrap();
    app.state.presence.connect(2, tx2).await.unwrap();

    let response = app
        .post_as(1, &format!("/api/v1/matches/{}/typing", match_id))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let event = tokio::time::timeout(Duration::from_secs(1), rx2.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        RealtimeEvent::TypingIndicator(e) => assert_eq!(e.user_id, "1"),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(rx1.try_recv().is_err());
}
