//! Like signal entity and repository trait.
//!
//! Maps to the `likes` table. Likes are only ever created; the
//! `(liker_id, liked_id)` pair is unique.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A directed interest signal from one user to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeSignal {
    pub liker_id: i64,
    pub liked_id: i64,
    pub is_super: bool,
    pub created_at: DateTime<Utc>,
}

impl LikeSignal {
    pub fn new(liker_id: i64, liked_id: i64, is_super: bool) -> Self {
        Self {
            liker_id,
            liked_id,
            is_super,
            created_at: Utc::now(),
        }
    }
}

/// Repository trait for like signals.
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Persist a like.
    ///
    /// Returns `AppError::Conflict` when the ordered pair already exists.
    async fn create(&self, like: &LikeSignal) -> Result<LikeSignal, AppError>;

    /// Whether `liker_id` has liked `liked_id`.
    async fn exists(&self, liker_id: i64, liked_id: i64) -> Result<bool, AppError>;

    /// Ids of every user `liker_id` has liked.
    async fn liked_ids(&self, liker_id: i64) -> Result<Vec<i64>, AppError>;
}
