//! # Matchmaker Server Library
//!
//! The matching and chat core of a dating app:
//! - Discovery of candidates filtered by gender, age and distance
//! - Likes, super likes, mutual-like matches, unmatching and blocks
//! - Per-match chat with read receipts and typing indicators
//! - A WebSocket gateway fed by a pub/sub event bus so events reach users
//!   connected to any process
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities, candidate filtering and repository traits
//! - **Application Layer**: Services, DTOs, realtime events and ports
//! - **Infrastructure Layer**: PostgreSQL, Redis, in-memory backends, metrics
//! - **Presentation Layer**: HTTP handlers and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! matchmaker_server/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, value objects, and traits
//! +-- application/    Application services, DTOs, events and ports
//! +-- infrastructure/ Database, Redis and in-memory implementations
//! +-- presentation/   HTTP routes and WebSocket handlers
//! +-- shared/         Common utilities (errors, retries, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
