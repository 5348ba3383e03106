//! Block entity and repository trait.
//!
//! Stored directionally in the `blocks` table, but a block in either
//! direction cuts off liking and messaging between the two users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub blocker_id: i64,
    pub blocked_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Block {
    pub fn new(blocker_id: i64, blocked_id: i64) -> Self {
        Self {
            blocker_id,
            blocked_id,
            created_at: Utc::now(),
        }
    }
}

/// Repository trait for blocks.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    /// Persist a block. Returns `AppError::Conflict` if it already exists.
    async fn create(&self, block: &Block) -> Result<Block, AppError>;

    /// Remove a block. Returns whether a row was deleted.
    async fn delete(&self, blocker_id: i64, blocked_id: i64) -> Result<bool, AppError>;

    /// Whether a block exists between the two users in either direction.
    async fn exists_between(&self, a: i64, b: i64) -> Result<bool, AppError>;

    /// Every user on the other side of a block involving `user_id`,
    /// regardless of direction.
    async fn related_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError>;

    /// Blocks created by `blocker_id`, newest first.
    async fn list_by_blocker(&self, blocker_id: i64) -> Result<Vec<Block>, AppError>;
}
