//! Event publishing with the shared retry policy.

use std::sync::Arc;

use crate::application::events::Envelope;
use crate::application::ports::EventBus;
use crate::shared::error::AppError;
use crate::shared::retry::RetryPolicy;

/// Publishes envelopes on the bus, retrying transient failures.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
    retry: RetryPolicy,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>, retry: RetryPolicy) -> Self {
        Self { bus, retry }
    }

    pub async fn publish(&self, envelope: Envelope) -> Result<(), AppError> {
        let room = envelope.room;
        let event = envelope.event.event_name();
        self.retry
            .run("bus.publish", || self.bus.publish(envelope.clone()))
            .await
            .inspect_err(|e| {
                tracing::error!(room = %room, event, error = %e, "Event publish failed");
            })
    }
}
