use std::sync::Arc;

use realtime::{Broadcaster, TriggerError};
use serde_json::Value;
use shared::error::{ApiError, ErrorCode};
use tracing::{error, info, warn};

/// Fans one publish out to every configured transport. A relay without
/// sinks is disabled: publishes are skipped and reported as success.
#[derive(Clone, Default)]
pub struct Relay {
    sinks: Vec<Arc<dyn Broadcaster>>,
}

impl Relay {
    pub fn new(sinks: Vec<Arc<dyn Broadcaster>>) -> Self {
        Self { sinks }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        !self.sinks.is_empty()
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Every sink is attempted; the first failure is returned.
    pub async fn trigger(&self, channel: &str, event: &str, data: &Value) -> Result<(), TriggerError> {
        if self.sinks.is_empty() {
            warn!(channel, event, "realtime transport not configured; skipping publish");
            return Ok(());
        }

        let mut first_error = None;
        for sink in &self.sinks {
            match sink.trigger(channel, event, data).await {
                Ok(()) => info!(sink = sink.name(), channel, event, "event relayed"),
                Err(err) => {
                    error!(sink = sink.name(), channel, event, error = %err, "failed to relay event");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// [`Relay::trigger`] with failures mapped to an internal error carrying
    /// `failure_message`.
    pub async fn publish(
        &self,
        channel: &str,
        event: &str,
        data: &Value,
        failure_message: &str,
    ) -> Result<(), ApiError> {
        self.trigger(channel, event, data)
            .await
            .map_err(|_| ApiError::new(ErrorCode::Internal, failure_message))
    }

    /// Publishes a side notification whose failure must not undo the
    /// operation that caused it.
    pub async fn notify(&self, channel: &str, event: &str, data: &Value) {
        if let Err(err) = self.trigger(channel, event, data).await {
            warn!(channel, event, error = %err, "notification dropped");
        }
    }
}

#[cfg(test)]
#[path = "tests/relay_tests.rs"]
mod tests;
