use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info};

use crate::{encode_payload, validate_channel, validate_event, Broadcaster, TriggerError};

const AUTH_VERSION: &str = "1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PusherConfig {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    pub cluster: String,
    /// Full base URL (`scheme://host[:port]`) replacing the cluster endpoint.
    pub host: Option<String>,
}

impl PusherConfig {
    pub fn base_url(&self) -> String {
        match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://api-{}.pusher.com", self.cluster),
        }
    }

    pub fn events_path(&self) -> String {
        format!("/apps/{}/events", self.app_id)
    }
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: [&'a str; 1],
    data: String,
}

/// Publishes through the Pusher Channels HTTP API.
#[derive(Clone)]
pub struct PusherClient {
    config: PusherConfig,
    http: reqwest::Client,
}

impl PusherClient {
    pub fn new(config: PusherConfig) -> Result<Self, TriggerError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        info!(app_id = %config.app_id, base_url = %config.base_url(), "pusher client configured");
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &PusherConfig {
        &self.config
    }

    /// Builds the signed query string for one publish of `body`.
    fn signed_query(&self, body: &str, timestamp: i64) -> Result<String, TriggerError> {
        let body_md5 = hex::encode(Md5::digest(body.as_bytes()));
        let query = format!(
            "auth_key={}&auth_timestamp={timestamp}&auth_version={AUTH_VERSION}&body_md5={body_md5}",
            self.config.key
        );
        let signature = sign_request(
            &self.config.secret,
            "POST",
            &self.config.events_path(),
            &query,
        )?;
        Ok(format!("{query}&auth_signature={signature}"))
    }
}

/// HMAC-SHA256 over `METHOD\nPATH\nQUERY`, hex encoded. `query` must already
/// be sorted by key and must not contain `auth_signature`.
pub fn sign_request(
    secret: &str,
    method: &str,
    path: &str,
    query: &str,
) -> Result<String, TriggerError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| TriggerError::Signing)?;
    mac.update(format!("{method}\n{path}\n{query}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl Broadcaster for PusherClient {
    fn name(&self) -> &'static str {
        "pusher"
    }

    async fn trigger(&self, channel: &str, event: &str, data: &Value) -> Result<(), TriggerError> {
        validate_channel(channel)?;
        validate_event(event)?;

        let body = TriggerBody {
            name: event,
            channels: [channel],
            data: encode_payload(data)?,
        };
        let body = serde_json::to_string(&body)?;
        let query = self.signed_query(&body, Utc::now().timestamp())?;
        let url = format!(
            "{}{}?{query}",
            self.config.base_url(),
            self.config.events_path()
        );

        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriggerError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(channel, event, "pusher publish accepted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/pusher_tests.rs"]
mod tests;
