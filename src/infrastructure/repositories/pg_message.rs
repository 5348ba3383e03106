//! Message Repository Implementation
//!
//! Read-state changes are single conditional UPDATEs so concurrent readers
//! cannot both observe the unread → read transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Message, MessageRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    match_id: i64,
    sender_id: i64,
    recipient_id: i64,
    content: String,
    attachment_url: Option<String>,
    created_at: DateTime<Utc>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            match_id: self.match_id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            content: self.content,
            attachment_url: self.attachment_url,
            created_at: self.created_at,
            is_read: self.is_read,
            read_at: self.read_at,
        }
    }
}

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &Message) -> Result<Option<Message>, AppError> {
        // FOR SHARE holds off a concurrent deactivate until the insert commits.
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, match_id, sender_id, recipient_id, content,
                                  attachment_url, created_at, is_read, read_at)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9
            WHERE EXISTS (
                SELECT 1 FROM matches WHERE id = $2 AND is_active FOR SHARE
            )
            RETURNING id, match_id, sender_id, recipient_id, content,
                      attachment_url, created_at, is_read, read_at
            "#,
        )
        .bind(message.id)
        .bind(message.match_id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.content)
        .bind(&message.attachment_url)
        .bind(message.created_at)
        .bind(message.is_read)
        .bind(message.read_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, match_id, sender_id, recipient_id, content,
                   attachment_url, created_at, is_read, read_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn find_by_match(
        &self,
        match_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, match_id, sender_id, recipient_id, content,
                   attachment_url, created_at, is_read, read_at
            FROM messages
            WHERE match_id = $1 AND ($2::BIGINT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(match_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn mark_read(&self, id: i64, at: DateTime<Utc>) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
            SET is_read = TRUE, read_at = $2
            WHERE id = $1 AND NOT is_read
            RETURNING id, match_id, sender_id, recipient_id, content,
                      attachment_url, created_at, is_read, read_at
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn mark_all_read(
        &self,
        match_id: i64,
        recipient_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            UPDATE messages
            SET is_read = TRUE, read_at = $3
            WHERE match_id = $1 AND recipient_id = $2 AND NOT is_read
            RETURNING id
            "#,
        )
        .bind(match_id)
        .bind(recipient_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn count_unread(&self, recipient_id: i64) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND NOT is_read")
                .bind(recipient_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn count_unread_in_match(
        &self,
        match_id: i64,
        recipient_id: i64,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE match_id = $1 AND recipient_id = $2 AND NOT is_read
            "#,
        )
        .bind(match_id)
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
