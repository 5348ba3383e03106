//! Message entity and repository trait.
//!
//! Maps to the `messages` table:
//! - id: BIGINT PRIMARY KEY (Snowflake ID)
//! - match_id: BIGINT NOT NULL REFERENCES matches(id)
//! - sender_id / recipient_id: BIGINT NOT NULL
//! - content: TEXT NOT NULL (may be empty when an attachment is present)
//! - attachment_url: TEXT NULL (stored by the media service)
//! - created_at: TIMESTAMPTZ NOT NULL
//! - is_read: BOOLEAN NOT NULL DEFAULT FALSE
//! - read_at: TIMESTAMPTZ NULL
//!
//! Messages are immutable apart from the read state, which only moves from
//! unread to read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maximum number of characters in a message body.
pub const MAX_CONTENT_LENGTH: usize = 4000;

/// A chat message inside a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Match this message belongs to
    pub match_id: i64,

    pub sender_id: i64,

    /// The other participant of the match
    pub recipient_id: i64,

    pub content: String,

    /// Reference to an uploaded file, if any
    pub attachment_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub is_read: bool,

    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    /// A message needs visible text or an attachment.
    pub fn has_body(content: &str, attachment_url: Option<&str>) -> bool {
        !content.trim().is_empty() || attachment_url.is_some_and(|url| !url.trim().is_empty())
    }
}

/// Repository trait for messages.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a message if its match exists and is still active, checked in
    /// the same step as the insert. `None` means the match was gone or
    /// deactivated and nothing was written.
    async fn create(&self, message: &Message) -> Result<Option<Message>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Messages of a match, newest first. `before` is an exclusive message id cursor.
    async fn find_by_match(
        &self,
        match_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Flip a single message to read.
    ///
    /// Returns the updated message only if this call performed the
    /// transition; an already-read message yields `None`.
    async fn mark_read(&self, id: i64, at: DateTime<Utc>) -> Result<Option<Message>, AppError>;

    /// Mark every unread message addressed to `recipient_id` in the match as
    /// read in one atomic statement. Returns the ids that changed.
    async fn mark_all_read(
        &self,
        match_id: i64,
        recipient_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError>;

    /// Unread messages addressed to `recipient_id` across all matches.
    async fn count_unread(&self, recipient_id: i64) -> Result<i64, AppError>;

    /// Unread messages addressed to `recipient_id` in one match.
    async fn count_unread_in_match(&self, match_id: i64, recipient_id: i64)
        -> Result<i64, AppError>;
}
