//! In-Memory Store
//!
//! Implements every repository trait over one mutex-guarded state, with the
//! same uniqueness rules as the PostgreSQL schema. Used by single-process
//! development setups and the test suites.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::{
    canonical_pair, Block, BlockRepository, DiscoveryQuery, LikeRepository, LikeSignal, Match, MatchRepository,
    Message, MessageRepository, User, UserRepository,
};
use crate::shared::error::AppError;

#[derive(Default)]
struct State {
    users: BTreeMap<i64, User>,
    likes: HashMap<(i64, i64), LikeSignal>,
    blocks: HashMap<(i64, i64), Block>,
    matches: HashMap<i64, Match>,
    /// Canonical pair -> match id, the uniqueness constraint
    match_pairs: HashMap<(i64, i64), i64>,
    messages: BTreeMap<i64, Message>,
}

impl State {
    /// Drop matches and their messages, messages first. Returns how many
    /// matches were removed.
    fn remove_matches(&mut self, ids: &[i64]) -> usize {
        self.messages.retain(|_, m| !ids.contains(&m.match_id));
        let mut removed = 0;
        for id in ids {
            if let Some(m) = self.matches.remove(id) {
                self.match_pairs.remove(&(m.user_a_id, m.user_b_id));
                removed += 1;
            }
        }
        removed
    }
}

/// Repository implementations backed by process memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile. Profiles are owned by the profile
    /// service; this is how they are seeded here.
    pub fn upsert_user(&self, user: User) {
        self.state.lock().users.insert(user.id, user);
    }

    pub fn match_count(&self) -> usize {
        self.state.lock().matches.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError> {
        let state = self.state.lock();
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn find_discoverable(&self, query: &DiscoveryQuery) -> Result<Vec<User>, AppError> {
        let state = self.state.lock();
        Ok(state
            .users
            .values()
            .filter(|u| query.admits(u))
            .cloned()
            .collect())
    }

    async fn set_online(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(user) = self.state.lock().users.get_mut(&id) {
            user.is_online = true;
            user.last_seen = Some(at);
        }
        Ok(())
    }

    async fn set_offline(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(user) = self.state.lock().users.get_mut(&id) {
            user.is_online = false;
            user.last_seen = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl LikeRepository for InMemoryStore {
    async fn create(&self, like: &LikeSignal) -> Result<LikeSignal, AppError> {
        let mut state = self.state.lock();
        let key = (like.liker_id, like.liked_id);
        if state.likes.contains_key(&key) {
            return Err(AppError::Conflict("Like already exists".into()));
        }
        state.likes.insert(key, like.clone());
        Ok(like.clone())
    }

    async fn exists(&self, liker_id: i64, liked_id: i64) -> Result<bool, AppError> {
        Ok(self.state.lock().likes.contains_key(&(liker_id, liked_id)))
    }

    async fn liked_ids(&self, liker_id: i64) -> Result<Vec<i64>, AppError> {
        let state = self.state.lock();
        Ok(state
            .likes
            .keys()
            .filter(|(liker, _)| *liker == liker_id)
            .map(|(_, liked)| *liked)
            .collect())
    }
}

#[async_trait]
impl BlockRepository for InMemoryStore {
    async fn create(&self, block: &Block) -> Result<Block, AppError> {
        let mut state = self.state.lock();
        let key = (block.blocker_id, block.blocked_id);
        if state.blocks.contains_key(&key) {
            return Err(AppError::Conflict("Block already exists".into()));
        }
        state.blocks.insert(key, block.clone());
        Ok(block.clone())
    }

    async fn delete(&self, blocker_id: i64, blocked_id: i64) -> Result<bool, AppError> {
        Ok(self
            .state
            .lock()
            .blocks
            .remove(&(blocker_id, blocked_id))
            .is_some())
    }

    async fn exists_between(&self, a: i64, b: i64) -> Result<bool, AppError> {
        let state = self.state.lock();
        Ok(state.blocks.contains_key(&(a, b)) || state.blocks.contains_key(&(b, a)))
    }

    async fn related_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let state = self.state.lock();
        Ok(state
            .blocks
            .keys()
            .filter_map(|&(blocker, blocked)| {
                if blocker == user_id {
                    Some(blocked)
                } else if blocked == user_id {
                    Some(blocker)
                } else {
                    None
                }
            })
            .collect())
    }

    async fn list_by_blocker(&self, blocker_id: i64) -> Result<Vec<Block>, AppError> {
        let state = self.state.lock();
        let mut blocks: Vec<Block> = state
            .blocks
            .values()
            .filter(|b| b.blocker_id == blocker_id)
            .cloned()
            .collect();
        blocks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(blocks)
    }
}

#[async_trait]
impl MatchRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Match>, AppError> {
        Ok(self.state.lock().matches.get(&id).cloned())
    }

    async fn find_by_pair(&self, a: i64, b: i64) -> Result<Option<Match>, AppError> {
        let state = self.state.lock();
        Ok(state
            .match_pairs
            .get(&canonical_pair(a, b))
            .and_then(|id| state.matches.get(id))
            .cloned())
    }

    async fn create_or_get(&self, candidate: &Match) -> Result<(Match, bool), AppError> {
        let mut state = self.state.lock();
        let pair = (candidate.user_a_id, candidate.user_b_id);

        if let Some(existing) = state
            .match_pairs
            .get(&pair)
            .and_then(|id| state.matches.get(id))
        {
            return Ok((existing.clone(), false));
        }

        state.match_pairs.insert(pair, candidate.id);
        state.matches.insert(candidate.id, candidate.clone());
        Ok((candidate.clone(), true))
    }

    async fn find_active_for_user(&self, user_id: i64) -> Result<Vec<Match>, AppError> {
        let state = self.state.lock();
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.is_active && m.is_participant(user_id))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(matches)
    }

    async fn deactivate(&self, id: i64) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        match state.matches.get_mut(&id) {
            Some(m) if m.is_active => {
                m.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(m) = self.state.lock().matches.get_mut(&id) {
            m.last_activity_at = at;
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.state.lock().remove_matches(&[id]) > 0)
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<Vec<Match>, AppError> {
        let mut state = self.state.lock();
        let mut deleted: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.is_participant(user_id))
            .cloned()
            .collect();
        deleted.sort_by_key(|m| m.id);
        let ids: Vec<i64> = deleted.iter().map(|m| m.id).collect();
        state.remove_matches(&ids);
        Ok(deleted)
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, message: &Message) -> Result<Option<Message>, AppError> {
        let mut state = self.state.lock();
        if !state.matches.get(&message.match_id).is_some_and(|m| m.is_active) {
            return Ok(None);
        }
        state.messages.insert(message.id, message.clone());
        Ok(Some(message.clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self.state.lock().messages.get(&id).cloned())
    }

    async fn find_by_match(
        &self,
        match_id: i64,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let state = self.state.lock();
        Ok(state
            .messages
            .values()
            .rev()
            .filter(|m| m.match_id == match_id)
            .filter(|m| before.map_or(true, |cursor| m.id < cursor))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: i64, at: DateTime<Utc>) -> Result<Option<Message>, AppError> {
        let mut state = self.state.lock();
        match state.messages.get_mut(&id) {
            Some(m) if !m.is_read => {
                m.is_read = true;
                m.read_at = Some(at);
                Ok(Some(m.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_all_read(
        &self,
        match_id: i64,
        recipient_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError> {
        let mut state = self.state.lock();
        let mut changed = Vec::new();
        for m in state.messages.values_mut() {
            if m.match_id == match_id && m.recipient_id == recipient_id && !m.is_read {
                m.is_read = true;
                m.read_at = Some(at);
                changed.push(m.id);
            }
        }
        Ok(changed)
    }

    async fn count_unread(&self, recipient_id: i64) -> Result<i64, AppError> {
        let state = self.state.lock();
        Ok(state
            .messages
            .values()
            .filter(|m| m.recipient_id == recipient_id && !m.is_read)
            .count() as i64)
    }

    async fn count_unread_in_match(
        &self,
        match_id: i64,
        recipient_id: i64,
    ) -> Result<i64, AppError> {
        let state = self.state.lock();
        Ok(state
            .messages
            .values()
            .filter(|m| m.match_id == match_id && m.recipient_id == recipient_id && !m.is_read)
            .count() as i64)
    }
}
