//! Event Router
//!
//! Consumes every envelope published on the bus and hands it to the local
//! connections joined to the envelope's room. One router task runs per
//! process.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::registry::ConnectionRegistry;
use crate::application::events::Envelope;
use crate::application::ports::EventBus;
use crate::infrastructure::metrics;

pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver one envelope locally. Returns the number of connections reached.
    pub fn route(&self, envelope: &Envelope) -> usize {
        let delivered = self.registry.deliver(envelope);
        if delivered > 0 {
            metrics::record_event_delivered(envelope.event.event_name(), delivered);
        }
        tracing::trace!(
            room = %envelope.room,
            event = envelope.event.event_name(),
            delivered,
            "Event routed"
        );
        delivered
    }

    /// Route until the bus closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<Arc<Envelope>>) {
        loop {
            match receiver.recv().await {
                Ok(envelope) => {
                    self.route(&envelope);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event router lagged; events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, router stopping");
                    break;
                }
            }
        }
    }

    /// Subscribe before spawning so nothing published afterwards is missed.
    pub fn spawn(self, bus: &dyn EventBus) -> JoinHandle<()> {
        let receiver = bus.subscribe();
        tokio::spawn(self.run(receiver))
    }
}
