//! Repository Implementations
//!
//! Concrete implementations of the repository traits defined in the domain
//! layer.
//!
//! ## Available Repositories
//!
//! - **PgUserRepository** - Profile reads and the online flag
//! - **PgLikeRepository** - Create-only like signals
//! - **PgBlockRepository** - Directional blocks
//! - **PgMatchRepository** - Canonical pairs, soft deactivation
//! - **PgMessageRepository** - Messages with cursor pagination and read state
//! - **InMemoryStore** - All five traits over process memory, used by tests
//!   and single-node development runs
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use matchmaker_server::infrastructure::repositories::{
//!     PgMatchRepository, PgMessageRepository,
//! };
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let match_repo = PgMatchRepository::new(pool.clone());
//!     let message_repo = PgMessageRepository::new(pool);
//! }
//! ```

pub mod memory;
pub mod pg_block;
pub mod pg_like;
pub mod pg_match;
pub mod pg_message;
pub mod pg_user;

pub use memory::InMemoryStore;
pub use pg_block::PgBlockRepository;
pub use pg_like::PgLikeRepository;
pub use pg_match::PgMatchRepository;
pub use pg_message::PgMessageRepository;
pub use pg_user::PgUserRepository;
