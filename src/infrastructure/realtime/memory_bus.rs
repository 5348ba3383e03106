//! In-process event bus over `tokio::sync::broadcast`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::application::events::Envelope;
use crate::application::ports::EventBus;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Event bus for a single process
pub struct InMemoryEventBus {
    sender: broadcast::Sender<Arc<Envelope>>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, envelope: Envelope) -> Result<(), AppError> {
        metrics::record_event_published(envelope.event.event_name());
        // No subscribers is not an error: nobody is listening yet.
        let _ = self.sender.send(Arc::new(envelope));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.sender.subscribe()
    }
}
