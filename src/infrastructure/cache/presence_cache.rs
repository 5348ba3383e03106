//! Presence Cache Service
//!
//! Redis-backed presence shared by every process: each user owns a set of
//! live connection ids under `presence:{user_id}`. Connects and heartbeats
//! push the expiry back, so the set lapses on its own once a process dies
//! without detaching.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::keys;
use crate::application::ports::{ConnectionId, PresenceStore};
use crate::shared::error::AppError;

/// Presence store over Redis sets.
#[derive(Clone)]
pub struct RedisPresenceStore {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl RedisPresenceStore {
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn attach(&self, user_id: i64, connection_id: ConnectionId) -> Result<usize, AppError> {
        let key = keys::presence(user_id);
        let mut conn = self.redis.clone();

        let (count,): (usize,) = redis::pipe()
            .atomic()
            .sadd(&key, connection_id.to_string())
            .ignore()
            .expire(&key, self.ttl_secs as i64)
            .ignore()
            .scard(&key)
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn detach(&self, user_id: i64, connection_id: ConnectionId) -> Result<usize, AppError> {
        let key = keys::presence(user_id);
        let mut conn = self.redis.clone();

        let (count,): (usize,) = redis::pipe()
            .atomic()
            .srem(&key, connection_id.to_string())
            .ignore()
            .scard(&key)
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn refresh(&self, user_id: i64, connection_id: ConnectionId) -> Result<(), AppError> {
        let key = keys::presence(user_id);
        let mut conn = self.redis.clone();

        redis::pipe()
            .atomic()
            .sadd(&key, connection_id.to_string())
            .ignore()
            .expire(&key, self.ttl_secs as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError> {
        let mut conn = self.redis.clone();
        let count: usize = conn.scard(keys::presence(user_id)).await?;
        Ok(count > 0)
    }
}
