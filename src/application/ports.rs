//! Realtime Ports
//!
//! Interfaces the services use to reach the realtime fabric. Implementations
//! live in `infrastructure::realtime` (in-memory, single process) and
//! `infrastructure::cache` (Redis, several processes).

use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{Envelope, RealtimeEvent};
use crate::domain::RoomId;
use crate::shared::error::AppError;

/// Identifier of one live client connection.
pub type ConnectionId = Uuid;

/// Cross-process publish/subscribe fabric.
///
/// A publish reaches every subscriber in every process, including the
/// publishing one.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an envelope to its room.
    async fn publish(&self, envelope: Envelope) -> Result<(), AppError>;

    /// Receive every envelope published on the bus from now on.
    fn subscribe(&self) -> broadcast::Receiver<Arc<Envelope>>;
}

/// Stream of events published to one room.
pub fn room_stream(bus: &dyn EventBus, room: RoomId) -> impl Stream<Item = RealtimeEvent> + Send {
    futures::stream::unfold(bus.subscribe(), move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(envelope) if envelope.room == room => {
                    return Some((envelope.event.clone(), rx));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(room = %room, skipped, "Room stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// Tracks which users have at least one live connection anywhere.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Record a live connection. Returns the user's live connection count.
    async fn attach(&self, user_id: i64, connection_id: ConnectionId) -> Result<usize, AppError>;

    /// Drop a live connection. Returns how many remain for the user.
    async fn detach(&self, user_id: i64, connection_id: ConnectionId) -> Result<usize, AppError>;

    /// Re-record a live connection and push back the entry's expiry.
    async fn refresh(&self, user_id: i64, connection_id: ConnectionId) -> Result<(), AppError>;

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError>;
}
