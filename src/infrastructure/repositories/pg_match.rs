//! Match Repository Implementation
//!
//! The `UNIQUE (user_a_id, user_b_id)` constraint is what makes concurrent
//! mutual likes converge on a single row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{canonical_pair, Match, MatchRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    id: i64,
    user_a_id: i64,
    user_b_id: i64,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    is_active: bool,
}

impl MatchRow {
    fn into_match(self) -> Match {
        Match {
            id: self.id,
            user_a_id: self.user_a_id,
            user_b_id: self.user_b_id,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
            is_active: self.is_active,
        }
    }
}

/// PostgreSQL match repository implementation.
#[derive(Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Match>, AppError> {
        let row = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT id, user_a_id, user_b_id, created_at, last_activity_at, is_active
            FROM matches
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_match()))
    }

    async fn find_by_pair(&self, a: i64, b: i64) -> Result<Option<Match>, AppError> {
        let (user_a_id, user_b_id) = canonical_pair(a, b);
        let row = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT id, user_a_id, user_b_id, created_at, last_activity_at, is_active
            FROM matches
            WHERE user_a_id = $1 AND user_b_id = $2
            "#,
        )
        .bind(user_a_id)
        .bind(user_b_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_match()))
    }

    async fn create_or_get(&self, candidate: &Match) -> Result<(Match, bool), AppError> {
        let inserted = sqlx::query_as::<_, MatchRow>(
            r#"
            INSERT INTO matches (id, user_a_id, user_b_id, created_at, last_activity_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_a_id, user_b_id) DO NOTHING
            RETURNING id, user_a_id, user_b_id, created_at, last_activity_at, is_active
            "#,
        )
        .bind(candidate.id)
        .bind(candidate.user_a_id)
        .bind(candidate.user_b_id)
        .bind(candidate.created_at)
        .bind(candidate.last_activity_at)
        .bind(candidate.is_active)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((row.into_match(), true));
        }

        // Lost the race: the other like already created the row.
        let existing = self
            .find_by_pair(candidate.user_a_id, candidate.user_b_id)
            .await?
            .ok_or_else(|| AppError::Internal("Match vanished after conflict".to_string()))?;

        Ok((existing, false))
    }

    async fn find_active_for_user(&self, user_id: i64) -> Result<Vec<Match>, AppError> {
        let rows = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT id, user_a_id, user_b_id, created_at, last_activity_at, is_active
            FROM matches
            WHERE (user_a_id = $1 OR user_b_id = $1) AND is_active
            ORDER BY last_activity_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_match()).collect())
    }

    async fn deactivate(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE matches SET is_active = FALSE WHERE id = $1 AND is_active")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock the row first so no message lands between the two deletes.
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM matches WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM messages WHERE match_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM matches WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<Vec<Match>, AppError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT id, user_a_id, user_b_id, created_at, last_activity_at, is_active
            FROM matches
            WHERE user_a_id = $1 OR user_b_id = $1
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        if !ids.is_empty() {
            sqlx::query("DELETE FROM messages WHERE match_id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM matches WHERE id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rows.into_iter().map(|r| r.into_match()).collect())
    }

    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE matches SET last_activity_at = GREATEST(last_activity_at, $2) WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
