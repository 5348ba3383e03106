//! Application Layer
//!
//! Contains business logic services, data transfer objects (DTOs), the
//! realtime events they publish and the ports the realtime fabric plugs into.
//! This layer orchestrates the flow of data between the presentation and
//! domain layers.

pub mod dto;
pub mod events;
pub mod ports;
pub mod services;
