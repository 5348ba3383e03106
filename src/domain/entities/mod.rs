//! # Domain Entities
//!
//! Core domain entities of the matching and chat core. All persisted entities
//! map directly to their corresponding database tables.
//!
//! - **User**: profile fields read by discovery and presence (owned elsewhere)
//! - **LikeSignal**: directed, create-only interest signal
//! - **Match**: canonical pair created on a mutual like, soft-deactivated
//! - **Message**: chat message with monotonic read state
//! - **Block**: directional block with symmetric effect
//!
//! Each entity has an associated repository trait implemented in the
//! infrastructure layer.

mod block;
mod like;
mod matches;
mod message;
mod user;

pub use block::{Block, BlockRepository};
pub use like::{LikeRepository, LikeSignal};
pub use matches::{canonical_pair, Match, MatchRepository};
pub use message::{Message, MessageRepository, MAX_CONTENT_LENGTH};
pub use user::{
    calendar_age, DiscoveryQuery, Gender, GenderPreference, Preferences, User, UserRepository,
    UserSummary,
};
