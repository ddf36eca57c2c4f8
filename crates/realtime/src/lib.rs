//! Broadcast transports for the presentation relay.
//!
//! A [`Broadcaster`] delivers one `(channel, event, data)` message at most
//! once. Nothing here stores, orders or retries messages.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

mod hub;
mod pusher;

pub use hub::LocalHub;
pub use pusher::{sign_request, PusherClient, PusherConfig};

pub const MAX_CHANNEL_NAME_LEN: usize = 164;
pub const MAX_EVENT_NAME_LEN: usize = 200;
pub const MAX_PAYLOAD_BYTES: usize = 10 * 1024;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid channel name '{0}'")]
    InvalidChannel(String),
    #[error("invalid event name '{0}'")]
    InvalidEvent(String),
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD_BYTES} byte limit")]
    PayloadTooLarge(usize),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("transport rejected publish with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid signing secret")]
    Signing,
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    fn name(&self) -> &'static str;

    async fn trigger(&self, channel: &str, event: &str, data: &Value) -> Result<(), TriggerError>;
}

pub fn validate_channel(channel: &str) -> Result<(), TriggerError> {
    let valid = !channel.is_empty()
        && channel.len() <= MAX_CHANNEL_NAME_LEN
        && channel
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-=@,.;".contains(c));
    if valid {
        Ok(())
    } else {
        Err(TriggerError::InvalidChannel(channel.to_string()))
    }
}

pub fn validate_event(event: &str) -> Result<(), TriggerError> {
    if event.is_empty() || event.len() > MAX_EVENT_NAME_LEN {
        return Err(TriggerError::InvalidEvent(event.to_string()));
    }
    Ok(())
}

/// Serializes `data` the way it travels on the wire and enforces the size cap.
pub fn encode_payload(data: &Value) -> Result<String, TriggerError> {
    let encoded = serde_json::to_string(data)?;
    if encoded.len() > MAX_PAYLOAD_BYTES {
        return Err(TriggerError::PayloadTooLarge(encoded.len()));
    }
    Ok(encoded)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
