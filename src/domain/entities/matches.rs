//! Match entity and repository trait.
//!
//! Maps to the `matches` table:
//! - id: BIGINT PRIMARY KEY (Snowflake ID)
//! - user_a_id / user_b_id: BIGINT NOT NULL, CHECK (user_a_id < user_b_id)
//! - UNIQUE (user_a_id, user_b_id)
//! - created_at / last_activity_at: TIMESTAMPTZ NOT NULL
//! - is_active: BOOLEAN NOT NULL DEFAULT TRUE
//!
//! Unmatching and blocking only clear `is_active`; the row and its messages
//! are kept.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Orders an unordered pair as `(min, max)`.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A mutual like between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    /// Lower of the two participant ids
    pub user_a_id: i64,
    /// Higher of the two participant ids
    pub user_b_id: i64,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Match {
    /// Creates an active match for the pair, ordering the ids canonically.
    pub fn new(id: i64, first: i64, second: i64) -> Self {
        let (user_a_id, user_b_id) = canonical_pair(first, second);
        let now = Utc::now();
        Self {
            id,
            user_a_id,
            user_b_id,
            created_at: now,
            last_activity_at: now,
            is_active: true,
        }
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        self.user_a_id == user_id || self.user_b_id == user_id
    }

    /// The participant that is not `user_id`, if `user_id` is one of them.
    pub fn other_participant(&self, user_id: i64) -> Option<i64> {
        if self.user_a_id == user_id {
            Some(self.user_b_id)
        } else if self.user_b_id == user_id {
            Some(self.user_a_id)
        } else {
            None
        }
    }
}

/// Repository trait for matches.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Match>, AppError>;

    /// Look up the match for an unordered pair.
    async fn find_by_pair(&self, a: i64, b: i64) -> Result<Option<Match>, AppError>;

    /// Insert `candidate` unless a match for the same pair already exists.
    ///
    /// Returns the stored row and whether this call created it. A concurrent
    /// insert for the same pair is reported as `(existing, false)`, never
    /// as an error.
    async fn create_or_get(&self, candidate: &Match) -> Result<(Match, bool), AppError>;

    /// Active matches of a user, most recent activity first.
    async fn find_active_for_user(&self, user_id: i64) -> Result<Vec<Match>, AppError>;

    /// Clear `is_active`. Returns whether the flag changed.
    async fn deactivate(&self, id: i64) -> Result<bool, AppError>;

    /// Bump `last_activity_at`.
    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Delete a match and its messages in one transaction, messages first.
    /// Returns whether the match existed.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    /// Delete every match of a user, active or not, with their messages.
    /// Returns the deleted matches in id order.
    async fn delete_for_user(&self, user_id: i64) -> Result<Vec<Match>, AppError>;
}
