//! Connection Registry
//!
//! Maps each live connection to its user and joined rooms, and each room to
//! the connections joined to it. Local to one process.
//!
//! Guards from the two maps are never held at the same time.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::events::{Envelope, RealtimeEvent};
use crate::application::ports::ConnectionId;
use crate::domain::RoomId;

/// Outbound queue of one connection
pub type EventSender = mpsc::UnboundedSender<RealtimeEvent>;

struct Connection {
    user_id: i64,
    rooms: HashSet<RoomId>,
    sender: EventSender,
}

/// Registry of the connections held by this process
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    rooms: DashMap<RoomId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user_id`. It starts with no rooms.
    pub fn register(&self, user_id: i64, sender: EventSender) -> ConnectionId {
        let connection_id = Uuid::now_v7();
        self.connections.insert(
            connection_id,
            Connection {
                user_id,
                rooms: HashSet::new(),
                sender,
            },
        );
        tracing::debug!(user_id, connection_id = %connection_id, "Connection registered");
        connection_id
    }

    /// Remove a connection and all its room memberships. Returns the owner.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<i64> {
        let (_, connection) = self.connections.remove(&connection_id)?;
        for room in &connection.rooms {
            self.remove_member(*room, connection_id);
        }
        tracing::debug!(
            user_id = connection.user_id,
            connection_id = %connection_id,
            "Connection unregistered"
        );
        Some(connection.user_id)
    }

    /// Join a room. Returns false if the connection is not registered.
    pub fn join(&self, connection_id: ConnectionId, room: RoomId) -> bool {
        // Room membership first so a concurrent unregister cannot leave a
        // stale id behind.
        self.rooms.entry(room).or_default().insert(connection_id);

        let registered = match self.connections.get_mut(&connection_id) {
            Some(mut connection) => {
                connection.rooms.insert(room);
                true
            }
            None => false,
        };

        if !registered {
            self.remove_member(room, connection_id);
        }
        registered
    }

    /// Leave a room. Returns whether the connection was joined.
    pub fn leave(&self, connection_id: ConnectionId, room: RoomId) -> bool {
        let was_joined = self
            .connections
            .get_mut(&connection_id)
            .map(|mut connection| connection.rooms.remove(&room))
            .unwrap_or(false);
        self.remove_member(room, connection_id);
        was_joined
    }

    pub fn user_of(&self, connection_id: ConnectionId) -> Option<i64> {
        self.connections.get(&connection_id).map(|c| c.user_id)
    }

    pub fn is_joined(&self, connection_id: ConnectionId, room: RoomId) -> bool {
        self.connections
            .get(&connection_id)
            .map(|c| c.rooms.contains(&room))
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Hand an envelope to every local connection joined to its room,
    /// skipping the excluded user's connections. Returns how many received it.
    pub fn deliver(&self, envelope: &Envelope) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.get(&envelope.room) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for connection_id in members {
            let Some(connection) = self.connections.get(&connection_id) else {
                continue;
            };
            if envelope.exclude_user == Some(connection.user_id) {
                continue;
            }
            // A closed queue means the connection is shutting down; its
            // disconnect path cleans up.
            if connection.sender.send(envelope.event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn remove_member(&self, room: RoomId, connection_id: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(&room) {
            members.remove(&connection_id);
        }
        self.rooms.remove_if(&room, |_, members| members.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::UnmatchedEvent;

    fn unmatched(room: RoomId) -> Envelope {
        Envelope::to(
            room,
            RealtimeEvent::Unmatched(UnmatchedEvent {
                match_id: "7".into(),
            }),
        )
    }

    #[test]
    fn test_deliver_reaches_only_joined_connections() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = registry.register(1, tx_a);
        let _b = registry.register(2, tx_b);

        assert!(registry.join(a, RoomId::Match(7)));
        assert_eq!(registry.deliver(&unmatched(RoomId::Match(7))), 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_deliver_skips_excluded_user() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = registry.register(1, tx_a);
        let b = registry.register(2, tx_b);
        registry.join(a, RoomId::Match(7));
        registry.join(b, RoomId::Match(7));

        let delivered = registry.deliver(&unmatched(RoomId::Match(7)).excluding(1));
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_unregister_clears_rooms() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = registry.register(1, tx);
        registry.join(conn, RoomId::User(1));
        registry.join(conn, RoomId::Match(9));

        assert_eq!(registry.unregister(conn), Some(1));
        assert_eq!(registry.deliver(&unmatched(RoomId::Match(9))), 0);
        assert!(registry.rooms.is_empty());
        assert_eq!(registry.unregister(conn), None);
    }

    #[test]
    fn test_join_unknown_connection_is_rejected() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.join(Uuid::now_v7(), RoomId::Match(1)));
        assert!(registry.rooms.is_empty());
    }

    #[test]
    fn test_leave_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = registry.register(1, tx);
        registry.join(conn, RoomId::Match(3));

        assert!(registry.leave(conn, RoomId::Match(3)));
        assert!(!registry.leave(conn, RoomId::Match(3)));
        assert!(!registry.is_joined(conn, RoomId::Match(3)));
    }
}
