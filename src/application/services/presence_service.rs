//! Presence Service
//!
//! Connection lifecycle and room membership. Connect and disconnect keep the
//! process-local registry, the cluster-wide presence store and the user's
//! online flag in step.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::publisher::EventPublisher;
use super::Repositories;
use crate::application::dto::response::{timestamp, JoinedRoomResponse};
use crate::application::events::{Envelope, MessagesReadBatchEvent, RealtimeEvent};
use crate::application::ports::{ConnectionId, PresenceStore};
use crate::domain::RoomId;
use crate::infrastructure::realtime::{ConnectionRegistry, EventSender};
use crate::shared::error::AppError;
use crate::shared::retry::RetryPolicy;

/// A registered connection and the rooms it was joined to.
#[derive(Debug, Clone)]
pub struct Connected {
    pub connection_id: ConnectionId,
    pub rooms: Vec<RoomId>,
}

/// Presence service trait
#[async_trait]
pub trait PresenceService: Send + Sync {
    /// Register a connection, join the user's personal room and every active
    /// match room, and mark the user online.
    async fn connect(&self, user_id: i64, sender: EventSender) -> Result<Connected, PresenceError>;

    /// Release a connection. Marks the user offline when it was their last.
    /// Returns the disconnect time.
    async fn disconnect(&self, connection_id: ConnectionId)
        -> Result<DateTime<Utc>, PresenceError>;

    /// Join a match room and mark the user's unread messages in it as read.
    async fn join_room(
        &self,
        connection_id: ConnectionId,
        match_id: i64,
    ) -> Result<JoinedRoomResponse, PresenceError>;

    async fn leave_room(&self, connection_id: ConnectionId, match_id: i64)
        -> Result<(), PresenceError>;

    /// Keep a connection's presence entry from expiring.
    async fn heartbeat(&self, connection_id: ConnectionId) -> Result<(), PresenceError>;
}

/// Presence service errors
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("User not found")]
    UserNotFound,

    #[error("Match not found")]
    MatchNotFound,

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Not a participant of this match")]
    NotAuthorized,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for PresenceError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Unavailable(msg) => PresenceError::Unavailable(msg),
            other => PresenceError::Internal(other.to_string()),
        }
    }
}

impl From<PresenceError> for AppError {
    fn from(error: PresenceError) -> Self {
        let message = error.to_string();
        match error {
            PresenceError::UserNotFound
            | PresenceError::MatchNotFound
            | PresenceError::ConnectionNotFound => AppError::NotFound(message),
            PresenceError::NotAuthorized => AppError::Forbidden(message),
            PresenceError::Unavailable(msg) => AppError::Unavailable(msg),
            PresenceError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// PresenceService implementation
pub struct PresenceServiceImpl {
    repos: Repositories,
    registry: Arc<ConnectionRegistry>,
    presence: Arc<dyn PresenceStore>,
    events: EventPublisher,
    retry: RetryPolicy,
}

impl PresenceServiceImpl {
    pub fn new(
        repos: Repositories,
        registry: Arc<ConnectionRegistry>,
        presence: Arc<dyn PresenceStore>,
        events: EventPublisher,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repos,
            registry,
            presence,
            events,
            retry,
        }
    }

    async fn go_online(&self, user_id: i64, connection_id: ConnectionId) -> Result<(), AppError> {
        let live = self
            .retry
            .run("presence.attach", || self.presence.attach(user_id, connection_id))
            .await?;
        let now = Utc::now();
        self.retry
            .run("users.set_online", || self.repos.users.set_online(user_id, now))
            .await?;
        tracing::info!(user_id, connection_id = %connection_id, live, "User connected");
        Ok(())
    }
}

#[async_trait]
impl PresenceService for PresenceServiceImpl {
    #[tracing::instrument(skip(self, sender))]
    async fn connect(&self, user_id: i64, sender: EventSender) -> Result<Connected, PresenceError> {
        self.retry
            .run("users.find_by_id", || self.repos.users.find_by_id(user_id))
            .await?
            .ok_or(PresenceError::UserNotFound)?;

        let matches = self
            .retry
            .run("matches.find_active_for_user", || {
                self.repos.matches.find_active_for_user(user_id)
            })
            .await?;

        let connection_id = self.registry.register(user_id, sender);
        let mut rooms = Vec::with_capacity(matches.len() + 1);
        rooms.push(RoomId::User(user_id));
        rooms.extend(matches.iter().map(|m| RoomId::Match(m.id)));
        for room in &rooms {
            self.registry.join(connection_id, *room);
        }

        if let Err(e) = self.go_online(user_id, connection_id).await {
            self.registry.unregister(connection_id);
            // Best effort: the presence entry may or may not have been written.
            let _ = self.presence.detach(user_id, connection_id).await;
            return Err(e.into());
        }

        Ok(Connected {
            connection_id,
            rooms,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn disconnect(
        &self,
        connection_id: ConnectionId,
    ) -> Result<DateTime<Utc>, PresenceError> {
        let now = Utc::now();
        // Registry first: local delivery stops even if the stores are down.
        let Some(user_id) = self.registry.unregister(connection_id) else {
            return Err(PresenceError::ConnectionNotFound);
        };

        let remaining = self
            .retry
            .run("presence.detach", || self.presence.detach(user_id, connection_id))
            .await?;

        if remaining == 0 {
            self.retry
                .run("users.set_offline", || self.repos.users.set_offline(user_id, now))
                .await?;
            // A connect that attached after our detach may have set the flag
            // before we cleared it.
            let reconnected = self
                .retry
                .run("presence.is_online", || self.presence.is_online(user_id))
                .await?;
            if reconnected {
                let at = Utc::now();
                self.retry
                    .run("users.set_online", || self.repos.users.set_online(user_id, at))
                    .await?;
                tracing::debug!(user_id, "Reconnected while going offline");
            } else {
                tracing::info!(user_id, connection_id = %connection_id, "User went offline");
            }
        } else {
            tracing::debug!(user_id, remaining, "Connection closed, user still online");
        }
        Ok(now)
    }

    #[tracing::instrument(skip(self))]
    async fn join_room(
        &self,
        connection_id: ConnectionId,
        match_id: i64,
    ) -> Result<JoinedRoomResponse, PresenceError> {
        let user_id = self
            .registry
            .user_of(connection_id)
            .ok_or(PresenceError::ConnectionNotFound)?;

        let m = self
            .retry
            .run("matches.find_by_id", || self.repos.matches.find_by_id(match_id))
            .await?
            .ok_or(PresenceError::MatchNotFound)?;
        let other_id = m
            .other_participant(user_id)
            .ok_or(PresenceError::NotAuthorized)?;

        let room = RoomId::Match(match_id);
        if !self.registry.join(connection_id, room) {
            return Err(PresenceError::ConnectionNotFound);
        }

        let now = Utc::now();
        let marked = self
            .retry
            .run("messages.mark_all_read", || {
                self.repos.messages.mark_all_read(match_id, user_id, now)
            })
            .await?;

        if !marked.is_empty() {
            self.events
                .publish(Envelope::to(
                    RoomId::User(other_id),
                    RealtimeEvent::MessagesReadBatch(MessagesReadBatchEvent {
                        match_id: match_id.to_string(),
                        reader_id: user_id.to_string(),
                        message_ids: marked.iter().map(|id| id.to_string()).collect(),
                        read_at: timestamp(now),
                    }),
                ))
                .await?;
        }

        let other_user = self
            .retry
            .run("users.find_by_id", || self.repos.users.find_by_id(other_id))
            .await?
            .map(|u| u.summary().into());

        Ok(JoinedRoomResponse {
            match_id: match_id.to_string(),
            room,
            other_user,
            marked_read: marked.len(),
        })
    }

    async fn leave_room(
        &self,
        connection_id: ConnectionId,
        match_id: i64,
    ) -> Result<(), PresenceError> {
        self.registry.leave(connection_id, RoomId::Match(match_id));
        Ok(())
    }

    async fn heartbeat(&self, connection_id: ConnectionId) -> Result<(), PresenceError> {
        let user_id = self
            .registry
            .user_of(connection_id)
            .ok_or(PresenceError::ConnectionNotFound)?;
        self.retry
            .run("presence.refresh", || self.presence.refresh(user_id, connection_id))
            .await?;
        Ok(())
    }
}
