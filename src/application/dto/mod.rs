//! Data Transfer Objects
//!
//! DTOs for API request/response and event payload serialization.

pub mod request;
pub mod response;
