//! Match Service
//!
//! Likes, mutual-like match creation, unmatching and blocking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::publisher::EventPublisher;
use super::Repositories;
use crate::application::dto::response::{
    timestamp, BlockResponse, LikeResponse, MatchResponse, UserSummaryResponse,
};
use crate::application::events::{
    Envelope, MatchCreatedEvent, RealtimeEvent, SuperLikeReceivedEvent, UnmatchedEvent,
};
use crate::domain::{Block, LikeSignal, Match, RoomId, User};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::retry::RetryPolicy;
use crate::shared::snowflake::SnowflakeGenerator;

/// Match service trait
#[async_trait]
pub trait MatchService: Send + Sync {
    /// Record a like; creates the match when the like is mutual.
    async fn like(&self, liker_id: i64, liked_id: i64, is_super: bool)
        -> Result<LikeResponse, MatchError>;

    /// Pass on a user. Nothing is stored.
    async fn dislike(&self, user_id: i64, target_id: i64) -> Result<(), MatchError>;

    /// Deactivate a match. Messages are kept.
    async fn unmatch(&self, match_id: i64, actor_id: i64) -> Result<(), MatchError>;

    /// Block a user, deactivating any active match between the pair.
    async fn block(&self, blocker_id: i64, blocked_id: i64) -> Result<BlockResponse, MatchError>;

    /// Remove a block. A match it deactivated stays inactive.
    async fn unblock(&self, blocker_id: i64, blocked_id: i64) -> Result<(), MatchError>;

    async fn list_blocked(&self, blocker_id: i64) -> Result<Vec<BlockResponse>, MatchError>;

    /// Active matches of a user, most recent activity first.
    async fn list_matches(&self, user_id: i64) -> Result<Vec<MatchResponse>, MatchError>;

    async fn get_match(&self, match_id: i64, actor_id: i64) -> Result<MatchResponse, MatchError>;

    /// Hard-delete a match and its messages. Called by account removal and
    /// moderation, not exposed over HTTP.
    async fn delete_match(&self, match_id: i64) -> Result<(), MatchError>;

    /// Hard-delete every match of a user ahead of removing the account.
    /// Returns how many matches were deleted.
    async fn delete_user_matches(&self, user_id: i64) -> Result<usize, MatchError>;
}

/// Match service errors
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Cannot target yourself")]
    SelfReference,

    #[error("User not found")]
    UserNotFound,

    #[error("Match not found")]
    MatchNotFound,

    #[error("Block not found")]
    BlockNotFound,

    #[error("Not a participant of this match")]
    NotAuthorized,

    #[error("User already liked")]
    DuplicateLike,

    #[error("User already blocked")]
    DuplicateBlock,

    #[error("Cannot interact with this user")]
    Blocked,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for MatchError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Unavailable(msg) => MatchError::Unavailable(msg),
            other => MatchError::Internal(other.to_string()),
        }
    }
}

impl From<MatchError> for AppError {
    fn from(error: MatchError) -> Self {
        let message = error.to_string();
        match error {
            MatchError::SelfReference => AppError::BadRequest(message),
            MatchError::UserNotFound | MatchError::MatchNotFound | MatchError::BlockNotFound => {
                AppError::NotFound(message)
            }
            MatchError::NotAuthorized | MatchError::Blocked => AppError::Forbidden(message),
            MatchError::DuplicateLike | MatchError::DuplicateBlock => AppError::Conflict(message),
            MatchError::Unavailable(msg) => AppError::Unavailable(msg),
            MatchError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// MatchService implementation
pub struct MatchServiceImpl {
    repos: Repositories,
    events: EventPublisher,
    ids: Arc<SnowflakeGenerator>,
    retry: RetryPolicy,
}

impl MatchServiceImpl {
    pub fn new(
        repos: Repositories,
        events: EventPublisher,
        ids: Arc<SnowflakeGenerator>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repos,
            events,
            ids,
            retry,
        }
    }

    async fn load_user(&self, user_id: i64) -> Result<User, MatchError> {
        self.retry
            .run("users.find_by_id", || self.repos.users.find_by_id(user_id))
            .await?
            .ok_or(MatchError::UserNotFound)
    }

    async fn load_match(&self, match_id: i64) -> Result<Match, MatchError> {
        self.retry
            .run("matches.find_by_id", || self.repos.matches.find_by_id(match_id))
            .await?
            .ok_or(MatchError::MatchNotFound)
    }

    async fn to_response(
        &self,
        m: &Match,
        viewer_id: i64,
        other: Option<UserSummaryResponse>,
    ) -> Result<MatchResponse, MatchError> {
        let unread_count = self
            .retry
            .run("messages.count_unread_in_match", || {
                self.repos.messages.count_unread_in_match(m.id, viewer_id)
            })
            .await?;

        Ok(MatchResponse {
            id: m.id.to_string(),
            other_user: other,
            created_at: timestamp(m.created_at),
            last_activity_at: timestamp(m.last_activity_at),
            is_active: m.is_active,
            unread_count,
        })
    }
}

#[async_trait]
impl MatchService for MatchServiceImpl {
    #[tracing::instrument(skip(self))]
    async fn like(
        &self,
        liker_id: i64,
        liked_id: i64,
        is_super: bool,
    ) -> Result<LikeResponse, MatchError> {
        if liker_id == liked_id {
            return Err(MatchError::SelfReference);
        }

        let liker = self.load_user(liker_id).await?;
        self.load_user(liked_id).await?;

        let blocked = self
            .retry
            .run("blocks.exists_between", || {
                self.repos.blocks.exists_between(liker_id, liked_id)
            })
            .await?;
        if blocked {
            tracing::debug!(liker_id, liked_id, "Like rejected: pair is blocked");
            return Err(MatchError::Blocked);
        }

        let like = LikeSignal::new(liker_id, liked_id, is_super);
        match self
            .retry
            .run("likes.create", || self.repos.likes.create(&like))
            .await
        {
            Ok(_) => {}
            Err(AppError::Conflict(_)) => {
                tracing::debug!(liker_id, liked_id, "Like rejected: duplicate");
                return Err(MatchError::DuplicateLike);
            }
            Err(e) => return Err(e.into()),
        }

        let mutual = self
            .retry
            .run("likes.exists", || self.repos.likes.exists(liked_id, liker_id))
            .await?;

        if mutual {
            let candidate = Match::new(self.ids.generate(), liker_id, liked_id);
            let (m, created) = self
                .retry
                .run("matches.create_or_get", || {
                    self.repos.matches.create_or_get(&candidate)
                })
                .await?;

            if created {
                metrics::record_match_created();
                tracing::info!(match_id = m.id, liker_id, liked_id, "Match created");
            } else {
                tracing::debug!(match_id = m.id, "Mutual like raced; using existing match");
            }

            self.events
                .publish(Envelope::to(
                    RoomId::User(liked_id),
                    RealtimeEvent::MatchCreated(MatchCreatedEvent {
                        match_id: m.id.to_string(),
                        user: liker.summary().into(),
                    }),
                ))
                .await?;

            return Ok(LikeResponse {
                is_match: true,
                match_id: Some(m.id.to_string()),
            });
        }

        if is_super {
            self.events
                .publish(Envelope::to(
                    RoomId::User(liked_id),
                    RealtimeEvent::SuperLikeReceived(SuperLikeReceivedEvent {
                        from_user: liker.summary().into(),
                    }),
                ))
                .await?;
        }

        Ok(LikeResponse {
            is_match: false,
            match_id: None,
        })
    }

    async fn dislike(&self, user_id: i64, target_id: i64) -> Result<(), MatchError> {
        if user_id == target_id {
            return Err(MatchError::SelfReference);
        }
        self.load_user(target_id).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn unmatch(&self, match_id: i64, actor_id: i64) -> Result<(), MatchError> {
        let m = self.load_match(match_id).await?;
        let other_id = m
            .other_participant(actor_id)
            .ok_or(MatchError::NotAuthorized)?;

        self.retry
            .run("matches.deactivate", || self.repos.matches.deactivate(match_id))
            .await?;
        tracing::info!(match_id, actor_id, "Match deactivated");

        self.events
            .publish(Envelope::to(
                RoomId::User(other_id),
                RealtimeEvent::Unmatched(UnmatchedEvent {
                    match_id: match_id.to_string(),
                }),
            ))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn block(&self, blocker_id: i64, blocked_id: i64) -> Result<BlockResponse, MatchError> {
        if blocker_id == blocked_id {
            return Err(MatchError::SelfReference);
        }
        self.load_user(blocked_id).await?;

        let block = Block::new(blocker_id, blocked_id);
        let block = match self
            .retry
            .run("blocks.create", || self.repos.blocks.create(&block))
            .await
        {
            Ok(block) => block,
            Err(AppError::Conflict(_)) => return Err(MatchError::DuplicateBlock),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(blocker_id, blocked_id, "User blocked");

        let existing = self
            .retry
            .run("matches.find_by_pair", || {
                self.repos.matches.find_by_pair(blocker_id, blocked_id)
            })
            .await?;
        if let Some(m) = existing.filter(|m| m.is_active) {
            // The blocked party is not told why the match went away.
            self.retry
                .run("matches.deactivate", || self.repos.matches.deactivate(m.id))
                .await?;
            tracing::info!(match_id = m.id, "Match deactivated by block");
        }

        Ok(block.into())
    }

    async fn unblock(&self, blocker_id: i64, blocked_id: i64) -> Result<(), MatchError> {
        let removed = self
            .retry
            .run("blocks.delete", || {
                self.repos.blocks.delete(blocker_id, blocked_id)
            })
            .await?;
        if !removed {
            return Err(MatchError::BlockNotFound);
        }
        tracing::info!(blocker_id, blocked_id, "User unblocked");
        Ok(())
    }

    async fn list_blocked(&self, blocker_id: i64) -> Result<Vec<BlockResponse>, MatchError> {
        let blocks = self
            .retry
            .run("blocks.list_by_blocker", || {
                self.repos.blocks.list_by_blocker(blocker_id)
            })
            .await?;
        Ok(blocks.into_iter().map(BlockResponse::from).collect())
    }

    async fn list_matches(&self, user_id: i64) -> Result<Vec<MatchResponse>, MatchError> {
        let matches = self
            .retry
            .run("matches.find_active_for_user", || {
                self.repos.matches.find_active_for_user(user_id)
            })
            .await?;

        let other_ids: Vec<i64> = matches
            .iter()
            .filter_map(|m| m.other_participant(user_id))
            .collect();
        let others: HashMap<i64, User> = self
            .retry
            .run("users.find_by_ids", || self.repos.users.find_by_ids(&other_ids))
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut responses = Vec::with_capacity(matches.len());
        for m in &matches {
            let other = m
                .other_participant(user_id)
                .and_then(|id| others.get(&id))
                .map(|u| u.summary().into());
            responses.push(self.to_response(m, user_id, other).await?);
        }
        Ok(responses)
    }

    async fn get_match(&self, match_id: i64, actor_id: i64) -> Result<MatchResponse, MatchError> {
        let m = self.load_match(match_id).await?;
        let other_id = m
            .other_participant(actor_id)
            .ok_or(MatchError::NotAuthorized)?;

        let other = self
            .retry
            .run("users.find_by_id", || self.repos.users.find_by_id(other_id))
            .await?
            .map(|u| u.summary().into());
        self.to_response(&m, actor_id, other).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_match(&self, match_id: i64) -> Result<(), MatchError> {
        let m = self.load_match(match_id).await?;
        self.retry
            .run("matches.delete", || self.repos.matches.delete(match_id))
            .await?;
        tracing::info!(match_id, "Match deleted");

        if m.is_active {
            for user_id in [m.user_a_id, m.user_b_id] {
                self.events
                    .publish(Envelope::to(
                        RoomId::User(user_id),
                        RealtimeEvent::Unmatched(UnmatchedEvent {
                            match_id: match_id.to_string(),
                        }),
                    ))
                    .await?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user_matches(&self, user_id: i64) -> Result<usize, MatchError> {
        let deleted = self
            .retry
            .run("matches.delete_for_user", || {
                self.repos.matches.delete_for_user(user_id)
            })
            .await?;
        tracing::info!(user_id, count = deleted.len(), "User matches deleted");

        for m in deleted.iter().filter(|m| m.is_active) {
            if let Some(other_id) = m.other_participant(user_id) {
                self.events
                    .publish(Envelope::to(
                        RoomId::User(other_id),
                        RealtimeEvent::Unmatched(UnmatchedEvent {
                            match_id: m.id.to_string(),
                        }),
                    ))
                    .await?;
            }
        }
        Ok(deleted.len())
    }
}
