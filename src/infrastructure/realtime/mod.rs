//! Realtime Fabric
//!
//! Process-local pieces of event delivery: the connection registry, the
//! router task that feeds it, and the in-memory bus and presence store used
//! when a single process serves every client. The Redis-backed bus and
//! presence store live in `infrastructure::cache`.

mod memory_bus;
mod presence;
mod registry;
mod router;

pub use memory_bus::InMemoryEventBus;
pub use presence::InMemoryPresenceStore;
pub use registry::{ConnectionRegistry, EventSender};
pub use router::EventRouter;
