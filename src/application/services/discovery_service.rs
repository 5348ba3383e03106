//! Discovery Service
//!
//! Produces the ranked candidate page for a requester.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::response::CandidateResponse;
use crate::domain::services::CandidateFilter;
use crate::domain::{BlockRepository, LikeRepository, UserRepository};
use crate::shared::error::AppError;
use crate::shared::retry::RetryPolicy;

/// Discovery service trait
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Candidates for `user_id`, nearest first.
    async fn discover(&self, user_id: i64) -> Result<Vec<CandidateResponse>, DiscoveryError>;
}

/// Discovery service errors
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("User not found")]
    UserNotFound,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for DiscoveryError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Unavailable(msg) => DiscoveryError::Unavailable(msg),
            other => DiscoveryError::Internal(other.to_string()),
        }
    }
}

impl From<DiscoveryError> for AppError {
    fn from(error: DiscoveryError) -> Self {
        match error {
            DiscoveryError::UserNotFound => AppError::NotFound("User not found".into()),
            DiscoveryError::Unavailable(msg) => AppError::Unavailable(msg),
            DiscoveryError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// DiscoveryService implementation
pub struct DiscoveryServiceImpl {
    users: Arc<dyn UserRepository>,
    likes: Arc<dyn LikeRepository>,
    blocks: Arc<dyn BlockRepository>,
    filter: CandidateFilter,
    retry: RetryPolicy,
}

impl DiscoveryServiceImpl {
    pub fn new(
        users: Arc<dyn UserRepository>,
        likes: Arc<dyn LikeRepository>,
        blocks: Arc<dyn BlockRepository>,
        filter: CandidateFilter,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            users,
            likes,
            blocks,
            filter,
            retry,
        }
    }
}

#[async_trait]
impl DiscoveryService for DiscoveryServiceImpl {
    #[tracing::instrument(skip(self))]
    async fn discover(&self, user_id: i64) -> Result<Vec<CandidateResponse>, DiscoveryError> {
        let requester = self
            .retry
            .run("users.find_by_id", || self.users.find_by_id(user_id))
            .await?
            .ok_or(DiscoveryError::UserNotFound)?;

        let liked = self
            .retry
            .run("likes.liked_ids", || self.likes.liked_ids(user_id))
            .await?;
        let blocked = self
            .retry
            .run("blocks.related_ids", || self.blocks.related_ids(user_id))
            .await?;

        let exclude: HashSet<i64> = liked
            .into_iter()
            .chain(blocked)
            .chain(std::iter::once(user_id))
            .collect();

        let today = Utc::now().date_naive();
        let query = self.filter.query(&requester, &exclude, today);
        let pool = self
            .retry
            .run("users.find_discoverable", || self.users.find_discoverable(&query))
            .await?;

        let ranked = self.filter.apply(&requester, pool, &exclude, today);
        tracing::debug!(user_id, candidates = ranked.len(), "Discovery page built");

        Ok(ranked
            .into_iter()
            .map(|candidate| CandidateResponse::from_ranked(candidate, today))
            .collect())
    }
}
