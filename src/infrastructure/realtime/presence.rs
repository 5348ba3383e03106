//! In-process presence store.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::application::ports::{ConnectionId, PresenceStore};
use crate::shared::error::AppError;

/// Live connection ids per user, for a single process
#[derive(Default)]
pub struct InMemoryPresenceStore {
    connections: DashMap<i64, HashSet<ConnectionId>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn attach(&self, user_id: i64, connection_id: ConnectionId) -> Result<usize, AppError> {
        let mut entry = self.connections.entry(user_id).or_default();
        entry.insert(connection_id);
        Ok(entry.len())
    }

    async fn detach(&self, user_id: i64, connection_id: ConnectionId) -> Result<usize, AppError> {
        match self.connections.entry(user_id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(&connection_id);
                let remaining = entry.get().len();
                if remaining == 0 {
                    entry.remove();
                }
                Ok(remaining)
            }
            Entry::Vacant(_) => Ok(0),
        }
    }

    async fn refresh(&self, user_id: i64, connection_id: ConnectionId) -> Result<(), AppError> {
        self.connections.entry(user_id).or_default().insert(connection_id);
        Ok(())
    }

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.connections.contains_key(&user_id))
    }
}
