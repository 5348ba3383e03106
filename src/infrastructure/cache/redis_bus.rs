//! Redis Event Bus
//!
//! Every process publishes envelopes as JSON on one Redis channel and runs a
//! listener that re-broadcasts what it hears to local subscribers. The
//! publishing process hears its own messages back, so local delivery takes
//! the same path as remote delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::events::Envelope;
use crate::application::ports::EventBus;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Event bus over Redis pub/sub.
#[derive(Clone)]
pub struct RedisEventBus {
    conn: ConnectionManager,
    channel: String,
    local: broadcast::Sender<Arc<Envelope>>,
}

impl RedisEventBus {
    /// Create the bus and start its listener.
    ///
    /// The listener reconnects with exponential backoff until the returned
    /// handle is aborted.
    pub fn start(
        client: Client,
        conn: ConnectionManager,
        channel: impl Into<String>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (local, _) = broadcast::channel(capacity.max(1));
        let bus = Self {
            conn,
            channel: channel.into(),
            local,
        };
        let listener = tokio::spawn(listen(client, bus.channel.clone(), bus.local.clone()));
        (bus, listener)
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, envelope: Envelope) -> Result<(), AppError> {
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| AppError::Internal(format!("Serialization error: {}", e)))?;

        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&self.channel, payload).await?;

        metrics::record_event_published(envelope.event.event_name());
        debug!(
            room = %envelope.room,
            event = envelope.event.event_name(),
            receivers,
            "Event published"
        );
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.local.subscribe()
    }
}

/// Forward the Redis channel to local subscribers, reconnecting on failure.
async fn listen(client: Client, channel: String, local: broadcast::Sender<Arc<Envelope>>) {
    let mut delay = MIN_RECONNECT_DELAY;

    loop {
        match forward(&client, &channel, &local).await {
            Ok(()) => {
                warn!(channel = %channel, "Redis subscription ended, reconnecting");
                delay = MIN_RECONNECT_DELAY;
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Redis subscription failed");
            }
        }

        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

async fn forward(
    client: &Client,
    channel: &str,
    local: &broadcast::Sender<Arc<Envelope>>,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    info!(channel, "Subscribed to event channel");

    let mut messages = pubsub.into_on_message();
    while let Some(message) = messages.next().await {
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Dropping non-text event payload");
                continue;
            }
        };

        if let Some(envelope) = decode(&payload) {
            // No local subscribers is fine.
            let _ = local.send(Arc::new(envelope));
        }
    }

    Ok(())
}

fn decode(payload: &str) -> Option<Envelope> {
    serde_json::from_str(payload)
        .inspect_err(|e| warn!(error = %e, "Dropping malformed event payload"))
        .ok()
}
