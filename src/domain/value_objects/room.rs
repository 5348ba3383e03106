//! Typed broadcast room identifiers.
//!
//! Every routed event targets exactly one room. A user's personal room carries
//! notifications that are not tied to a conversation; a match room carries live
//! in-conversation traffic.
//!
//! The wire form is `user:{id}` / `match:{id}`, which is also the pub/sub
//! envelope representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named broadcast group that connections can join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoomId {
    /// Personal room of a user (`user:{id}`)
    User(i64),
    /// Conversation room of a match (`match:{id}`)
    Match(i64),
}

/// Error returned when parsing a malformed room name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid room id: {0}")]
pub struct InvalidRoomId(pub String);

impl RoomId {
    /// Numeric id of the user or match this room belongs to.
    pub fn id(&self) -> i64 {
        match self {
            RoomId::User(id) | RoomId::Match(id) => *id,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, RoomId::Match(_))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomId::User(id) => write!(f, "user:{}", id),
            RoomId::Match(id) => write!(f, "match:{}", id),
        }
    }
}

impl FromStr for RoomId {
    type Err = InvalidRoomId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| InvalidRoomId(s.to_string()))?;
        let id: i64 = id.parse().map_err(|_| InvalidRoomId(s.to_string()))?;

        match kind {
            "user" => Ok(RoomId::User(id)),
            "match" => Ok(RoomId::Match(id)),
            _ => Err(InvalidRoomId(s.to_string())),
        }
    }
}

impl TryFrom<String> for RoomId {
    type Error = InvalidRoomId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomId> for String {
    fn from(room: RoomId) -> Self {
        room.to_string()
    }
}
