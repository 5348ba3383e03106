//! Multi-node Fan-out Tests
//!
//! Two application nodes on one shared event bus: events published by a
//! request on one node reach connections held by the other.

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;

use matchmaker_server::application::events::RealtimeEvent;
use matchmaker_server::domain::UserRepository;

use crate::common::{user, TestApp};

async fn next_event(rx: &mut mpsc::UnboundedReceiver<RealtimeEvent>) -> RealtimeEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap()
}

async fn is_online(app: &TestApp, user_id: i64) -> bool {
    UserRepository::find_by_id(app.store.as_ref(), user_id)
        .await
        .unwrap()
        .unwrap()
        .is_online
}

#[tokio::test]
async fn test_message_sent_on_one_node_reaches_recipient_on_another() {
    let (a, b) = TestApp::cluster().await;
    for id in [1, 2] {
        a.add_user(user(id));
    }
    let match_id = a.create_match(1, 2).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connected = b.state.presence.connect(2, tx).await.unwrap();
    assert_eq!(connected.rooms.len(), 2);
    assert_eq!(a.state.registry.connection_count(), 0);

    let response = a
        .post_json_as(
            1,
            &format!("/api/v1/matches/{}/messages", match_id),
            json!({"content": "across nodes"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut names = Vec::new();
    for _ in 0..2 {
        let event = next_event(&mut rx).await;
        if let RealtimeEvent::NewMessage(e) = &event {
            assert_eq!(e.message.content, "across nodes");
        }
        names.push(event.event_name());
    }
    names.sort();
    assert_eq!(names, vec!["new_message", "new_message_notification"]);
}

#[tokio::test]
async fn test_typing_skips_the_typist_on_every_node() {
    let (a, b) = TestApp::cluster().await;
    for id in [1, 2] {
        a.add_user(user(id));
    }
    let match_id = a.create_match(1, 2).await;

    // The typist has a second session on the recipient's node.
    let (tx1, mut rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    b.state.presence.connect(1, tx1).await.unwrap();
    b.state.presence.connect(2, tx2).await.unwrap();

    let response = a
        .post_as(1, &format!("/api/v1/matches/{}/typing", match_id))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    match next_event(&mut rx2).await {
        RealtimeEvent::TypingIndicator(e) => assert_eq!(e.user_id, "1"),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(rx1.try_recv().is_err());
}

#[tokio::test]
async fn test_presence_is_shared_across_nodes() {
    let (a, b) = TestApp::cluster().await;
    a.add_user(user(1));

    let (tx_a, _rx_a) = mpsc::unbounded_channel();
    let (tx_b, _rx_b) = mpsc::unbounded_channel();
    let on_a = a.state.presence.connect(1, tx_a).await.unwrap();
    let on_b = b.state.presence.connect(1, tx_b).await.unwrap();

    // Closing the node A session leaves the node B one online.
    a.state.presence.disconnect(on_a.connection_id).await.unwrap();
    assert!(is_online(&b, 1).await);

    b.state.presence.disconnect(on_b.connection_id).await.unwrap();
    assert!(!is_online(&b, 1).await);
}
