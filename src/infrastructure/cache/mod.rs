//! Cache Module
//!
//! Redis-backed pieces of the realtime fabric.
//!
//! This module provides:
//! - Redis connection management with automatic reconnection
//! - `RedisEventBus`: one pub/sub channel shared by every process
//! - `RedisPresenceStore`: per-user sets of live connection ids
//! - Predefined key prefixes for consistent cache key naming
//!
//! # Architecture
//!
//! ```text
//! +-------------------+        +-------------------+
//! |  EventPublisher   |        |  PresenceService  |
//! +-------------------+        +-------------------+
//!          |                            |
//!          v                            v
//! +-------------------+        +-------------------+
//! |  RedisEventBus    |        | RedisPresenceStore|
//! +-------------------+        +-------------------+
//!          |   ^                        |
//!  PUBLISH |   | SUBSCRIBE              | SADD / SREM / SCARD
//!          v   |                        v
//! +---------------------------------------------------+
//! |                       Redis                       |
//! +---------------------------------------------------+
//! ```

mod presence_cache;
mod redis_bus;

pub use presence_cache::RedisPresenceStore;
pub use redis_bus::RedisEventBus;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Errors
/// Returns `redis::RedisError` if the URL is invalid or the first
/// connection fails.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key prefixes.
///
/// # Example
/// ```rust,ignore
/// use matchmaker_server::infrastructure::cache::keys;
///
/// let presence_key = keys::presence(user_id);
/// ```
pub mod keys {
    /// Prefix for a user's live connection set (e.g., "presence:user_id")
    pub const USER_PRESENCE: &str = "presence:";

    /// Generates a presence key for a user
    #[inline]
    pub fn presence(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", USER_PRESENCE, user_id)
    }
}
