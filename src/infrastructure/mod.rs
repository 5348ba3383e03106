//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL) and an in-memory store
//! - Redis pub/sub event bus and presence counters
//! - In-process realtime fan-out (connection registry, event router)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod realtime;
pub mod repositories;
