//! Like Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{LikeRepository, LikeSignal};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct LikeRow {
    liker_id: i64,
    liked_id: i64,
    is_super: bool,
    created_at: DateTime<Utc>,
}

impl LikeRow {
    fn into_like(self) -> LikeSignal {
        LikeSignal {
            liker_id: self.liker_id,
            liked_id: self.liked_id,
            is_super: self.is_super,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL like repository implementation.
#[derive(Clone)]
pub struct PgLikeRepository {
    pool: PgPool,
}

impl PgLikeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikeRepository for PgLikeRepository {
    async fn create(&self, like: &LikeSignal) -> Result<LikeSignal, AppError> {
        let row = sqlx::query_as::<_, LikeRow>(
            r#"
            INSERT INTO likes (liker_id, liked_id, is_super, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING liker_id, liked_id, is_super, created_at
            "#,
        )
        .bind(like.liker_id)
        .bind(like.liked_id)
        .bind(like.is_super)
        .bind(like.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("User already liked".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_like())
    }

    async fn exists(&self, liker_id: i64, liked_id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE liker_id = $1 AND liked_id = $2)",
        )
        .bind(liker_id)
        .bind(liked_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn liked_ids(&self, liker_id: i64) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT liked_id FROM likes WHERE liker_id = $1")
            .bind(liker_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }
}
