//! Response DTOs
//!
//! Data structures for API response bodies and realtime event payloads.
//! Snowflake ids are serialized as strings so JavaScript clients keep full
//! precision.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::services::RankedCandidate;
use crate::domain::{round_km, Block, Match, Message, RoomId, UserSummary};

/// Public view of another user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummaryResponse {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<String>,
}

impl From<UserSummary> for UserSummaryResponse {
    fn from(user: UserSummary) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            is_online: user.is_online,
            last_seen: user.last_seen.map(|t| t.to_rfc3339()),
        }
    }
}

/// Discovery candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    /// Kilometres, rounded to one decimal
    pub distance_km: Option<f64>,
}

impl CandidateResponse {
    pub fn from_ranked(candidate: RankedCandidate, today: NaiveDate) -> Self {
        let age = candidate.user.age_on(today);
        let user = candidate.user;
        Self {
            id: user.id.to_string(),
            username: user.username,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            age,
            gender: user.gender.map(|g| g.as_str().to_string()),
            distance_km: candidate.distance_km.map(round_km),
        }
    }
}

/// Result of a like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeResponse {
    pub is_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
}

/// Bare match reference used inside notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRefResponse {
    pub id: String,
    pub user_a_id: String,
    pub user_b_id: String,
    pub created_at: String,
    pub last_activity_at: String,
    pub is_active: bool,
}

impl From<&Match> for MatchRefResponse {
    fn from(m: &Match) -> Self {
        Self {
            id: m.id.to_string(),
            user_a_id: m.user_a_id.to_string(),
            user_b_id: m.user_b_id.to_string(),
            created_at: m.created_at.to_rfc3339(),
            last_activity_at: m.last_activity_at.to_rfc3339(),
            is_active: m.is_active,
        }
    }
}

/// Match as listed for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub id: String,
    pub other_user: Option<UserSummaryResponse>,
    pub created_at: String,
    pub last_activity_at: String,
    pub is_active: bool,
    pub unread_count: i64,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub match_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    pub created_at: String,
    pub is_read: bool,
    pub read_at: Option<String>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.to_string(),
            match_id: message.match_id.to_string(),
            sender_id: message.sender_id.to_string(),
            recipient_id: message.recipient_id.to_string(),
            content: message.content,
            attachment_url: message.attachment_url,
            created_at: message.created_at.to_rfc3339(),
            is_read: message.is_read,
            read_at: message.read_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response to joining a match room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRoomResponse {
    pub match_id: String,
    pub room: RoomId,
    pub other_user: Option<UserSummaryResponse>,
    /// Messages that this join marked as read
    pub marked_read: usize,
}

/// Block entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockResponse {
    pub blocked_id: String,
    pub created_at: String,
}

impl From<Block> for BlockResponse {
    fn from(block: Block) -> Self {
        Self {
            blocked_id: block.blocked_id.to_string(),
            created_at: block.created_at.to_rfc3339(),
        }
    }
}

/// Unread message counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

/// Formats a timestamp the way every response does.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}
