//! # Domain Layer
//!
//! The domain layer contains the core rules of discovery, matching and chat.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, LikeSignal, Match, Message, Block)
//! - **value_objects**: Immutable value types (RoomId, GeoPoint)
//! - **services**: Pure domain services (CandidateFilter)
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior

pub mod entities;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use value_objects::*;
