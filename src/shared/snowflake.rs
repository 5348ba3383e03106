//! Snowflake ID Generator
//!
//! Time-ordered 64-bit ids generated in-process:
//!
//! ```text
//! | 42 bits ms since epoch | 5 bits machine | 5 bits node | 12 bits sequence |
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Default epoch (2015-01-01T00:00:00.000Z)
pub const DEFAULT_EPOCH: u64 = 1420070400000;

const SEQUENCE_MASK: u64 = 0xFFF;

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    machine_id: u64,
    node_id: u64,
    epoch: u64,
    /// (last timestamp, sequence within that millisecond)
    state: Mutex<(u64, u64)>,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator using the default epoch
    pub fn new(machine_id: u64, node_id: u64) -> Self {
        Self::with_epoch(machine_id, node_id, DEFAULT_EPOCH)
    }

    pub fn with_epoch(machine_id: u64, node_id: u64, epoch: u64) -> Self {
        Self {
            machine_id: machine_id & 0x1F,
            node_id: node_id & 0x1F,
            epoch,
            state: Mutex::new((0, 0)),
        }
    }

    /// Generate a new snowflake ID. Never repeats within one generator, even
    /// when more than 4096 ids are requested in the same millisecond.
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();
        let (last, sequence) = *state;

        let mut timestamp = current_millis().max(last);
        let next_sequence = if timestamp == last {
            (sequence + 1) & SEQUENCE_MASK
        } else {
            0
        };

        if timestamp == last && next_sequence == 0 {
            // Sequence exhausted: borrow the next millisecond.
            timestamp = last + 1;
        }
        *state = (timestamp, next_sequence);

        (((timestamp.saturating_sub(self.epoch)) << 22)
            | (self.machine_id << 17)
            | (self.node_id << 12)
            | next_sequence) as i64
    }

    /// Extract the unix-millisecond timestamp from an id
    pub fn timestamp_of(&self, snowflake: i64) -> u64 {
        ((snowflake as u64) >> 22) + self.epoch
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique_and_increasing() {
        let gen = SnowflakeGenerator::new(1, 1);
        let ids: Vec<i64> = (0..10_000).map(|_| gen.generate()).collect();

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let gen = SnowflakeGenerator::new(3, 0);
        let before = current_millis();
        let id = gen.generate();
        let ts = gen.timestamp_of(id);
        assert!(ts >= before);
        assert!(ts <= current_millis() + 5);
    }

    #[test]
    fn test_machine_id_is_masked() {
        let gen = SnowflakeGenerator::new(33, 0);
        let id = gen.generate() as u64;
        assert_eq!((id >> 17) & 0x1F, 1);
    }
}
