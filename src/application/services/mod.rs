//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **DiscoveryService**: Ranked candidate pages
//! - **MatchService**: Likes, matches, unmatching and blocks
//! - **ChatService**: Messages, typing indicators and read receipts
//! - **PresenceService**: Connection lifecycle and room membership

pub mod chat_service;
pub mod discovery_service;
pub mod match_service;
pub mod presence_service;
pub mod publisher;

use std::sync::Arc;

use crate::domain::{
    BlockRepository, LikeRepository, MatchRepository, MessageRepository, UserRepository,
};

pub use chat_service::{ChatError, ChatLimits, ChatService, ChatServiceImpl};
pub use discovery_service::{DiscoveryError, DiscoveryService, DiscoveryServiceImpl};
pub use match_service::{MatchError, MatchService, MatchServiceImpl};
pub use presence_service::{Connected, PresenceError, PresenceService, PresenceServiceImpl};
pub use publisher::EventPublisher;

/// The repositories the services read and write.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub blocks: Arc<dyn BlockRepository>,
    pub matches: Arc<dyn MatchRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

impl Repositories {
    /// Use one store for every repository.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + LikeRepository
            + BlockRepository
            + MatchRepository
            + MessageRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            likes: store.clone(),
            blocks: store.clone(),
            matches: store.clone(),
            messages: store,
        }
    }
}
