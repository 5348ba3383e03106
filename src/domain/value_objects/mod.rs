//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **RoomId**: typed broadcast room (`user:{id}` or `match:{id}`)
//! - **GeoPoint**: coordinates with haversine distance
//! - **GeoBounds**: latitude/longitude box used to narrow discovery queries

mod geo;
mod room;

pub use geo::*;
pub use room::*;
