//! Chat Service
//!
//! Messages, typing indicators and read receipts inside a match.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::publisher::EventPublisher;
use super::Repositories;
use crate::application::dto::request::{HistoryQuery, SendMessageRequest};
use crate::application::dto::response::{
    timestamp, MatchRefResponse, MessageResponse, UnreadCountResponse,
};
use crate::application::events::{
    Envelope, MessageReadEvent, NewMessageEvent, NewMessageNotificationEvent, RealtimeEvent,
    TypingIndicatorEvent,
};
use crate::config::ChatSettings;
use crate::domain::{Match, Message, RoomId, MAX_CONTENT_LENGTH};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::retry::RetryPolicy;
use crate::shared::snowflake::SnowflakeGenerator;

/// Chat service trait
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Persist a message and fan it out to the match room and the
    /// recipient's personal room.
    async fn send_message(
        &self,
        match_id: i64,
        sender_id: i64,
        request: SendMessageRequest,
    ) -> Result<MessageResponse, ChatError>;

    /// Tell the other participant that `user_id` is typing.
    async fn typing(&self, match_id: i64, user_id: i64) -> Result<(), ChatError>;

    /// Mark one message read. Repeating it is a no-op.
    async fn mark_read(&self, message_id: i64, actor_id: i64)
        -> Result<MessageResponse, ChatError>;

    /// Messages of a match, newest first.
    async fn message_history(
        &self,
        match_id: i64,
        actor_id: i64,
        query: HistoryQuery,
    ) -> Result<Vec<MessageResponse>, ChatError>;

    async fn unread_count(&self, user_id: i64) -> Result<UnreadCountResponse, ChatError>;
}

/// Chat service errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Match not found")]
    MatchNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Not authorized for this conversation")]
    NotAuthorized,

    #[error("Match is no longer active")]
    InactiveMatch,

    #[error("Message content is required")]
    EmptyContent,

    #[error("Message exceeds {0} characters")]
    ContentTooLong(usize),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for ChatError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Unavailable(msg) => ChatError::Unavailable(msg),
            other => ChatError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(error: ChatError) -> Self {
        let message = error.to_string();
        match error {
            ChatError::MatchNotFound | ChatError::MessageNotFound => AppError::NotFound(message),
            ChatError::NotAuthorized => AppError::Forbidden(message),
            ChatError::InactiveMatch => AppError::Conflict(message),
            ChatError::EmptyContent | ChatError::ContentTooLong(_) => AppError::BadRequest(message),
            ChatError::Unavailable(msg) => AppError::Unavailable(msg),
            ChatError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Message limits and history paging
#[derive(Debug, Clone, Copy)]
pub struct ChatLimits {
    pub max_content_length: usize,
    pub history_page_size: i64,
    pub history_max_page_size: i64,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_content_length: MAX_CONTENT_LENGTH,
            history_page_size: 50,
            history_max_page_size: 100,
        }
    }
}

impl From<&ChatSettings> for ChatLimits {
    fn from(settings: &ChatSettings) -> Self {
        Self {
            max_content_length: settings.max_content_length,
            history_page_size: settings.history_page_size,
            history_max_page_size: settings.history_max_page_size,
        }
    }
}

/// ChatService implementation
pub struct ChatServiceImpl {
    repos: Repositories,
    events: EventPublisher,
    ids: Arc<SnowflakeGenerator>,
    retry: RetryPolicy,
    limits: ChatLimits,
}

impl ChatServiceImpl {
    pub fn new(
        repos: Repositories,
        events: EventPublisher,
        ids: Arc<SnowflakeGenerator>,
        retry: RetryPolicy,
        limits: ChatLimits,
    ) -> Self {
        Self {
            repos,
            events,
            ids,
            retry,
            limits,
        }
    }

    /// Load a match and return it with the other participant's id.
    async fn participant_match(
        &self,
        match_id: i64,
        user_id: i64,
    ) -> Result<(Match, i64), ChatError> {
        let m = self
            .retry
            .run("matches.find_by_id", || self.repos.matches.find_by_id(match_id))
            .await?
            .ok_or(ChatError::MatchNotFound)?;

        match m.other_participant(user_id) {
            Some(other_id) => Ok((m, other_id)),
            None => {
                tracing::debug!(match_id, user_id, "Rejected: not a participant");
                Err(ChatError::NotAuthorized)
            }
        }
    }
}

#[async_trait]
impl ChatService for ChatServiceImpl {
    #[tracing::instrument(skip(self, request))]
    async fn send_message(
        &self,
        match_id: i64,
        sender_id: i64,
        request: SendMessageRequest,
    ) -> Result<MessageResponse, ChatError> {
        let (mut m, recipient_id) = self.participant_match(match_id, sender_id).await?;
        if !m.is_active {
            return Err(ChatError::InactiveMatch);
        }

        let attachment_url = request
            .attachment_url
            .filter(|url| !url.trim().is_empty());
        if !Message::has_body(&request.content, attachment_url.as_deref()) {
            return Err(ChatError::EmptyContent);
        }
        if request.content.chars().count() > self.limits.max_content_length {
            return Err(ChatError::ContentTooLong(self.limits.max_content_length));
        }

        let now = Utc::now();
        let message = Message {
            id: self.ids.generate(),
            match_id,
            sender_id,
            recipient_id,
            content: request.content,
            attachment_url,
            created_at: now,
            is_read: false,
            read_at: None,
        };

        let message = self
            .retry
            .run("messages.create", || self.repos.messages.create(&message))
            .await?
            .ok_or(ChatError::InactiveMatch)?;
        self.retry
            .run("matches.touch", || self.repos.matches.touch(match_id, now))
            .await?;
        m.last_activity_at = now;
        metrics::record_message_sent();

        let payload = MessageResponse::from(message);

        self.events
            .publish(Envelope::to(
                RoomId::Match(match_id),
                RealtimeEvent::NewMessage(NewMessageEvent {
                    message: payload.clone(),
                }),
            ))
            .await?;
        self.events
            .publish(Envelope::to(
                RoomId::User(recipient_id),
                RealtimeEvent::NewMessageNotification(NewMessageNotificationEvent {
                    message: payload.clone(),
                    match_ref: MatchRefResponse::from(&m),
                }),
            ))
            .await?;

        Ok(payload)
    }

    async fn typing(&self, match_id: i64, user_id: i64) -> Result<(), ChatError> {
        self.participant_match(match_id, user_id).await?;

        self.events
            .publish(
                Envelope::to(
                    RoomId::Match(match_id),
                    RealtimeEvent::TypingIndicator(TypingIndicatorEvent {
                        match_id: match_id.to_string(),
                        user_id: user_id.to_string(),
                        timestamp: timestamp(Utc::now()),
                    }),
                )
                .excluding(user_id),
            )
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn mark_read(
        &self,
        message_id: i64,
        actor_id: i64,
    ) -> Result<MessageResponse, ChatError> {
        let message = self
            .retry
            .run("messages.find_by_id", || {
                self.repos.messages.find_by_id(message_id)
            })
            .await?
            .ok_or(ChatError::MessageNotFound)?;

        if message.recipient_id != actor_id {
            tracing::debug!(message_id, actor_id, "Read rejected: not the recipient");
            return Err(ChatError::NotAuthorized);
        }

        let now = Utc::now();
        let transitioned = self
            .retry
            .run("messages.mark_read", || {
                self.repos.messages.mark_read(message_id, now)
            })
            .await?;

        let Some(updated) = transitioned else {
            return Ok(message.into());
        };

        self.events
            .publish(Envelope::to(
                RoomId::User(updated.sender_id),
                RealtimeEvent::MessageRead(MessageReadEvent {
                    message_id: updated.id.to_string(),
                    match_id: updated.match_id.to_string(),
                    read_at: timestamp(updated.read_at.unwrap_or(now)),
                }),
            ))
            .await?;
        Ok(updated.into())
    }

    async fn message_history(
        &self,
        match_id: i64,
        actor_id: i64,
        query: HistoryQuery,
    ) -> Result<Vec<MessageResponse>, ChatError> {
        self.participant_match(match_id, actor_id).await?;

        let limit = query
            .limit
            .unwrap_or(self.limits.history_page_size)
            .clamp(1, self.limits.history_max_page_size);
        let messages = self
            .retry
            .run("messages.find_by_match", || {
                self.repos.messages.find_by_match(match_id, query.before, limit)
            })
            .await?;
        Ok(messages.into_iter().map(MessageResponse::from).collect())
    }

    async fn unread_count(&self, user_id: i64) -> Result<UnreadCountResponse, ChatError> {
        let unread = self
            .retry
            .run("messages.count_unread", || {
                self.repos.messages.count_unread(user_id)
            })
            .await?;
        Ok(UnreadCountResponse { unread })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{drain, Harness};
    use crate::application::services::MatchService;
    use crate::domain::{MatchRepository, MessageRepository};
    use pretty_assertions::assert_eq;

    fn text(content: &str) -> SendMessageRequest {
        SendMessageRequest {
            content: content.to_string(),
            attachment_url: None,
        }
    }

    #[tokio::test]
    async fn test_send_publishes_to_match_and_recipient() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        let mut rx = h.subscribe();

        let sent = h.chat_service().send_message(m.id, 1, text("hi")).await.unwrap();
        assert_eq!(sent.recipient_id, "2");
        assert!(!sent.is_read);

        let published = drain(&mut rx);
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].room, RoomId::Match(m.id));
        assert_eq!(published[1].room, RoomId::User(2));
        match (&published[0].event, &published[1].event) {
            (RealtimeEvent::NewMessage(a), RealtimeEvent::NewMessageNotification(b)) => {
                assert_eq!(a.message, b.message);
                assert_eq!(b.match_ref.id, m.id.to_string());
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_updates_last_activity() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;

        h.chat_service().send_message(m.id, 2, text("hello")).await.unwrap();

        let stored = MatchRepository::find_by_id(h.store.as_ref(), m.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.last_activity_at > m.last_activity_at);
    }

    #[tokio::test]
    async fn test_send_by_non_participant() {
        let h = Harness::new(&[1, 2, 3]);
        let m = h.matched(1, 2).await;
        let err = h
            .chat_service()
            .send_message(m.id, 3, text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NotAuthorized));
    }

    #[tokio::test]
    async fn test_send_after_block_is_inactive() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        h.match_service().block(2, 1).await.unwrap();

        let err = h
            .chat_service()
            .send_message(m.id, 1, text("still there?"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InactiveMatch));
    }

    /// Delays every insert so a block can land between the active check
    /// and the write.
    struct SlowInsert {
        store: Arc<crate::infrastructure::repositories::InMemoryStore>,
    }

    #[async_trait]
    impl MessageRepository for SlowInsert {
        async fn create(&self, message: &Message) -> Result<Option<Message>, AppError> {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            MessageRepository::create(self.store.as_ref(), message).await
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
            MessageRepository::find_by_id(self.store.as_ref(), id).await
        }

        async fn find_by_match(
            &self,
            match_id: i64,
            before: Option<i64>,
            limit: i64,
        ) -> Result<Vec<Message>, AppError> {
            self.store.find_by_match(match_id, before, limit).await
        }

        async fn mark_read(
            &self,
            id: i64,
            at: chrono::DateTime<Utc>,
        ) -> Result<Option<Message>, AppError> {
            self.store.mark_read(id, at).await
        }

        async fn mark_all_read(
            &self,
            match_id: i64,
            recipient_id: i64,
            at: chrono::DateTime<Utc>,
        ) -> Result<Vec<i64>, AppError> {
            self.store.mark_all_read(match_id, recipient_id, at).await
        }

        async fn count_unread(&self, recipient_id: i64) -> Result<i64, AppError> {
            self.store.count_unread(recipient_id).await
        }

        async fn count_unread_in_match(
            &self,
            match_id: i64,
            recipient_id: i64,
        ) -> Result<i64, AppError> {
            self.store.count_unread_in_match(match_id, recipient_id).await
        }
    }

    #[tokio::test]
    async fn test_block_during_send_rejects_the_message() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        let mut repos = Repositories::from_store(h.store.clone());
        repos.messages = Arc::new(SlowInsert {
            store: h.store.clone(),
        });
        let chat = Arc::new(ChatServiceImpl::new(
            repos,
            EventPublisher::new(h.bus.clone(), RetryPolicy::default()),
            h.ids.clone(),
            RetryPolicy::default(),
            ChatLimits::default(),
        ));
        let mut rx = h.subscribe();

        let sending = {
            let chat = chat.clone();
            let match_id = m.id;
            tokio::spawn(async move { chat.send_message(match_id, 1, text("are you there?")).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        h.match_service().block(2, 1).await.unwrap();

        let err = sending.await.unwrap().unwrap_err();
        assert!(matches!(err, ChatError::InactiveMatch));
        assert!(h.store.find_by_match(m.id, None, 10).await.unwrap().is_empty());
        let sent: Vec<Envelope> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e.event, RealtimeEvent::NewMessage(_)))
            .collect();
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_blank_content_without_attachment() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        let service = h.chat_service();

        let err = service.send_message(m.id, 1, text("   ")).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyContent));

        let with_attachment = SendMessageRequest {
            content: String::new(),
            attachment_url: Some("https://cdn.example.com/a.jpg".into()),
        };
        let sent = service.send_message(m.id, 1, with_attachment).await.unwrap();
        assert_eq!(
            sent.attachment_url.as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
    }

    #[tokio::test]
    async fn test_content_too_long() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        let long = "x".repeat(MAX_CONTENT_LENGTH + 1);

        let err = h
            .chat_service()
            .send_message(m.id, 1, text(&long))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ContentTooLong(MAX_CONTENT_LENGTH)));
    }

    #[tokio::test]
    async fn test_typing_excludes_sender() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        let mut rx = h.subscribe();

        h.chat_service().typing(m.id, 1).await.unwrap();

        let published = drain(&mut rx);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].room, RoomId::Match(m.id));
        assert_eq!(published[0].exclude_user, Some(1));
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        let message = h.message(m.id, 1, 2).await;
        let service = h.chat_service();
        let mut rx = h.subscribe();

        let first = service.mark_read(message.id, 2).await.unwrap();
        assert!(first.is_read);
        let second = service.mark_read(message.id, 2).await.unwrap();
        assert_eq!(second.read_at, first.read_at);

        let published = drain(&mut rx);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].room, RoomId::User(1));
        assert!(matches!(published[0].event, RealtimeEvent::MessageRead(_)));
    }

    #[tokio::test]
    async fn test_mark_read_by_sender_is_rejected() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        let message = h.message(m.id, 1, 2).await;

        let err = h.chat_service().mark_read(message.id, 1).await.unwrap_err();
        assert!(matches!(err, ChatError::NotAuthorized));
        let stored = MessageRepository::find_by_id(h.store.as_ref(), message.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_read);
    }

    #[tokio::test]
    async fn test_history_pages_newest_first() {
        let h = Harness::new(&[1, 2]);
        let m = h.matched(1, 2).await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(h.message(m.id, 1, 2).await.id);
        }
        let service = h.chat_service();

        let page = service
            .message_history(
                m.id,
                2,
                HistoryQuery {
                    before: None,
                    limit: Some(2),
                },
            )
            .await
            .unwrap();
        let got: Vec<String> = page.iter().map(|msg| msg.id.clone()).collect();
        assert_eq!(got, vec![ids[2].to_string(), ids[1].to_string()]);

        let rest = service
            .message_history(
                m.id,
                2,
                HistoryQuery {
                    before: Some(ids[1]),
                    limit: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, ids[0].to_string());

        assert_eq!(service.unread_count(2).await.unwrap().unread, 3);
    }
}
