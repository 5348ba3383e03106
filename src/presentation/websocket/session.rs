//! WebSocket Session Management

use std::time::{Duration, Instant};

use crate::application::ports::ConnectionId;

/// State of one identified gateway connection
#[derive(Debug)]
pub struct SessionState {
    pub user_id: i64,
    pub connection_id: ConnectionId,
    pub sequence: u64,
    pub last_heartbeat: Instant,
}

impl SessionState {
    pub fn new(user_id: i64, connection_id: ConnectionId) -> Self {
        Self {
            user_id,
            connection_id,
            sequence: 0,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.last_heartbeat.elapsed() < timeout
    }
}
