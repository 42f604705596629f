//! Inbound-webhook channel.
//!
//! In webhook mode the provider pushes message events to our HTTP surface
//! and we never hold a socket ourselves. Normalization reuses the shared
//! upsert shapes; sends go out through the provider's HTTP API with bearer
//! credentials. No prefilter here — the pushing provider only forwards
//! messages from external senders.

use {
    courier_common::{IncomingMessage, OutgoingMessage},
    serde::Serialize,
    tracing::{debug, warn},
};

use crate::{error::ChannelError, normalize, raw::RawUpsertPayload};

#[derive(Serialize)]
struct SendTextRequest<'a> {
    to: &'a str,
    text: &'a str,
}

/// HTTP send + webhook normalize for the inbound-webhook provider.
#[derive(Clone)]
pub struct WebhookChannel {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl WebhookChannel {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Parse a raw webhook body into a domain message.
    ///
    /// Unparseable shapes are a `None`, not an error — the webhook endpoint
    /// acknowledges regardless.
    pub fn normalize(&self, payload: &serde_json::Value) -> Option<IncomingMessage> {
        let parsed: RawUpsertPayload = match serde_json::from_value(payload.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "unparseable webhook payload");
                return None;
            },
        };
        normalize::normalize_upsert(&parsed)
    }

    /// Deliver a reply through the provider's message API.
    pub async fn send(&self, message: &OutgoingMessage) -> Result<(), ChannelError> {
        if self.api_url.is_empty() {
            return Err(ChannelError::NotConfigured("webhook api url"));
        }
        let response = self
            .client
            .post(format!("{}/messages", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&SendTextRequest {
                to: &message.to,
                text: &message.text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Http {
                status: status.as_u16(),
                body,
            });
        }
        debug!(to = %message.to, "webhook channel delivered reply");
        Ok(())
    }
}
