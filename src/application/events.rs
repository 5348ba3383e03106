//! Realtime Events
//!
//! Payloads routed to rooms and the envelope that carries them across the
//! event bus. On the wire an event is `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};

use super::dto::response::{MatchRefResponse, MessageResponse, UserSummaryResponse};
use crate::domain::RoomId;

/// Every event a client can receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    MatchCreated(MatchCreatedEvent),
    SuperLikeReceived(SuperLikeReceivedEvent),
    Unmatched(UnmatchedEvent),
    NewMessage(NewMessageEvent),
    NewMessageNotification(NewMessageNotificationEvent),
    TypingIndicator(TypingIndicatorEvent),
    MessageRead(MessageReadEvent),
    MessagesReadBatch(MessagesReadBatchEvent),
}

impl RealtimeEvent {
    /// Event name as sent to clients
    pub fn event_name(&self) -> &'static str {
        match self {
            RealtimeEvent::MatchCreated(_) => "match_created",
            RealtimeEvent::SuperLikeReceived(_) => "super_like_received",
            RealtimeEvent::Unmatched(_) => "unmatched",
            RealtimeEvent::NewMessage(_) => "new_message",
            RealtimeEvent::NewMessageNotification(_) => "new_message_notification",
            RealtimeEvent::TypingIndicator(_) => "typing_indicator",
            RealtimeEvent::MessageRead(_) => "message_read",
            RealtimeEvent::MessagesReadBatch(_) => "messages_read_batch",
        }
    }

    /// Payload without the tag, for dispatch frames
    pub fn data(&self) -> serde_json::Value {
        let value = match self {
            RealtimeEvent::MatchCreated(e) => serde_json::to_value(e),
            RealtimeEvent::SuperLikeReceived(e) => serde_json::to_value(e),
            RealtimeEvent::Unmatched(e) => serde_json::to_value(e),
            RealtimeEvent::NewMessage(e) => serde_json::to_value(e),
            RealtimeEvent::NewMessageNotification(e) => serde_json::to_value(e),
            RealtimeEvent::TypingIndicator(e) => serde_json::to_value(e),
            RealtimeEvent::MessageRead(e) => serde_json::to_value(e),
            RealtimeEvent::MessagesReadBatch(e) => serde_json::to_value(e),
        };
        value.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCreatedEvent {
    pub match_id: String,
    /// The user who completed the match
    pub user: UserSummaryResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperLikeReceivedEvent {
    pub from_user: UserSummaryResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedEvent {
    pub match_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub message: MessageResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessageNotificationEvent {
    pub message: MessageResponse,
    #[serde(rename = "match")]
    pub match_ref: MatchRefResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingIndicatorEvent {
    pub match_id: String,
    pub user_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReadEvent {
    pub message_id: String,
    pub match_id: String,
    pub read_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesReadBatchEvent {
    pub match_id: String,
    pub reader_id: String,
    pub message_ids: Vec<String>,
    pub read_at: String,
}

/// An event addressed to one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub room: RoomId,
    /// Connections of this user are skipped on delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_user: Option<i64>,
    pub event: RealtimeEvent,
}

impl Envelope {
    pub fn to(room: RoomId, event: RealtimeEvent) -> Self {
        Self {
            room,
            exclude_user: None,
            event,
        }
    }

    /// Skip every connection of `user_id` when delivering.
    pub fn excluding(mut self, user_id: i64) -> Self {
        self.exclude_user = Some(user_id);
        self
    }
}
