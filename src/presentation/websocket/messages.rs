//! WebSocket Message Types
//!
//! Gateway frames are `{op, d, s, t, nonce}` JSON objects. Client commands
//! carry an optional `nonce` that the server echoes in the matching Reply.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::application::events::RealtimeEvent;
use crate::domain::RoomId;
use crate::shared::error::{AppError, ErrorResponse};

/// Gateway opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Routed event (server -> client)
    Dispatch = 0,
    /// Heartbeat (client -> server)
    Heartbeat = 1,
    /// Identify with a bearer token (client -> server)
    Identify = 2,
    /// Join a match room (client -> server)
    JoinMatch = 3,
    /// Leave a match room (client -> server)
    LeaveMatch = 4,
    /// Send a chat message (client -> server)
    SendMessage = 5,
    /// Typing indicator (client -> server)
    Typing = 6,
    /// Mark a message read (client -> server)
    ReadMessage = 7,
    /// Identify failed; the server closes the socket
    InvalidSession = 9,
    /// Sent on connect with the heartbeat interval
    Hello = 10,
    /// Heartbeat acknowledged
    HeartbeatAck = 11,
    /// Result of a client command, carrying its nonce
    Reply = 12,
}

impl OpCode {
    pub fn from_u8(op: u8) -> Option<Self> {
        Some(match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::JoinMatch,
            4 => Self::LeaveMatch,
            5 => Self::SendMessage,
            6 => Self::Typing,
            7 => Self::ReadMessage,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            12 => Self::Reply,
            _ => return None,
        })
    }
}

/// Incoming gateway message
#[derive(Debug, Deserialize)]
pub struct GatewayReceive {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Value>,
    #[serde(default)]
    pub nonce: Option<String>,
}

/// Outgoing gateway message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewaySend {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl GatewaySend {
    fn op(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op: op as u8,
            d,
            s: None,
            t: None,
            nonce: None,
        }
    }

    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::op(
            OpCode::Hello,
            Some(json!(HelloPayload { heartbeat_interval })),
        )
    }

    pub fn heartbeat_ack() -> Self {
        Self::op(OpCode::HeartbeatAck, None)
    }

    pub fn invalid_session() -> Self {
        Self::op(OpCode::InvalidSession, Some(json!(false)))
    }

    /// `READY` dispatch sent once after a successful Identify.
    pub fn ready(sequence: u64, payload: &ReadyPayload) -> Self {
        Self {
            s: Some(sequence),
            t: Some("READY".to_string()),
            ..Self::op(OpCode::Dispatch, Some(json!(payload)))
        }
    }

    /// Routed event, named by its event type.
    pub fn dispatch(sequence: u64, event: &RealtimeEvent) -> Self {
        Self {
            s: Some(sequence),
            t: Some(event.event_name().to_string()),
            ..Self::op(OpCode::Dispatch, Some(event.data()))
        }
    }

    pub fn reply(nonce: Option<String>, result: Result<Value, AppError>) -> Self {
        let body = match result {
            Ok(data) => ReplyPayload {
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(error) => ReplyPayload {
                ok: false,
                data: None,
                error: Some(ErrorResponse::from(&error)),
            },
        };
        Self {
            nonce,
            ..Self::op(OpCode::Reply, Some(json!(body)))
        }
    }
}

/// Hello payload (op 10)
#[derive(Debug, Serialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// Identify payload (op 2)
#[derive(Debug, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
}

/// Ready payload (dispatch READY)
#[derive(Debug, Serialize)]
pub struct ReadyPayload {
    pub connection_id: String,
    pub user_id: String,
    pub rooms: Vec<RoomId>,
}

/// Reply payload (op 12)
#[derive(Debug, Serialize)]
pub struct ReplyPayload {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Join/leave/typing payload (ops 3, 4, 6)
#[derive(Debug, Deserialize)]
pub struct MatchPayload {
    pub match_id: String,
}

/// Send message payload (op 5)
#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub match_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
}

/// Read message payload (op 7)
#[derive(Debug, Deserialize)]
pub struct ReadMessagePayload {
    pub message_id: String,
}
