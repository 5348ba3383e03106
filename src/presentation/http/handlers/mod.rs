//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod blocks;
pub mod chat;
pub mod discovery;
pub mod health;
pub mod matches;
