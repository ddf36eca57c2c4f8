use async_trait::async_trait;
use serde_json::Value;
use shared::presentation::RelayedEvent;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{encode_payload, validate_channel, validate_event, Broadcaster, TriggerError};

/// In-process fan-out for websocket subscribers. Receivers that fall behind
/// the buffer lose the oldest messages.
#[derive(Clone)]
pub struct LocalHub {
    events: broadcast::Sender<RelayedEvent>,
}

impl LocalHub {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayedEvent> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl Broadcaster for LocalHub {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn trigger(&self, channel: &str, event: &str, data: &Value) -> Result<(), TriggerError> {
        validate_channel(channel)?;
        validate_event(event)?;
        encode_payload(data)?;

        let message = RelayedEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            data: data.clone(),
        };
        // No receivers is not an error: nobody is watching this session.
        let delivered = self.events.send(message).unwrap_or(0);
        debug!(channel, event, delivered, "local hub publish");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/hub_tests.rs"]
mod tests;
