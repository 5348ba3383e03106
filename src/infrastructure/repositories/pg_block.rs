//! Block Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Block, BlockRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct BlockRow {
    blocker_id: i64,
    blocked_id: i64,
    created_at: DateTime<Utc>,
}

impl BlockRow {
    fn into_block(self) -> Block {
        Block {
            blocker_id: self.blocker_id,
            blocked_id: self.blocked_id,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL block repository implementation.
#[derive(Clone)]
pub struct PgBlockRepository {
    pool: PgPool,
}

impl PgBlockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlockRepository for PgBlockRepository {
    async fn create(&self, block: &Block) -> Result<Block, AppError> {
        let row = sqlx::query_as::<_, BlockRow>(
            r#"
            INSERT INTO blocks (blocker_id, blocked_id, created_at)
            VALUES ($1, $2, $3)
            RETURNING blocker_id, blocked_id, created_at
            "#,
        )
        .bind(block.blocker_id)
        .bind(block.blocked_id)
        .bind(block.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("User already blocked".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_block())
    }

    async fn delete(&self, blocker_id: i64, blocked_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists_between(&self, a: i64, b: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM blocks
                WHERE (blocker_id = $1 AND blocked_id = $2)
                   OR (blocker_id = $2 AND blocked_id = $1)
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn related_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT blocked_id FROM blocks WHERE blocker_id = $1
            UNION
            SELECT blocker_id FROM blocks WHERE blocked_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn list_by_blocker(&self, blocker_id: i64) -> Result<Vec<Block>, AppError> {
        let rows = sqlx::query_as::<_, BlockRow>(
            r#"
            SELECT blocker_id, blocked_id, created_at
            FROM blocks
            WHERE blocker_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(blocker_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_block()).collect())
    }
}
