//! The transport behind the gateway, as a tagged variant.
//!
//! Each variant exposes only the operations meaningful to it: the direct
//! connection has no webhook normalizer (its frames arrive on the socket),
//! the webhook and cloud channels have no QR or lifecycle state.

use std::sync::Arc;

use {
    anyhow::{Context, Result},
    courier_channels::{CloudApiChannel, WebhookChannel},
    courier_common::{IncomingMessage, OutgoingMessage},
    courier_whatsapp::ConnectionManager,
    tracing::debug,
};

pub enum Provider {
    /// Direct persistent connection via the Baileys sidecar.
    Baileys(Arc<ConnectionManager>),
    /// Inbound provider webhooks, sends over the provider HTTP API.
    Webhook(WebhookChannel),
    /// Hosted cloud API.
    CloudApi(CloudApiChannel),
}

impl Provider {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Baileys(_) => "baileys",
            Self::Webhook(_) => "webhook",
            Self::CloudApi(_) => "cloud_api",
        }
    }

    /// Deliver an outgoing message through this transport.
    pub async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        match self {
            Self::Baileys(manager) => manager
                .send_text(&message.to, &message.text)
                .await
                .context("baileys send failed"),
            Self::Webhook(channel) => channel
                .send(message)
                .await
                .context("webhook send failed"),
            Self::CloudApi(channel) => channel
                .send(message)
                .await
                .context("cloud api send failed"),
        }
    }

    /// Normalize an HTTP-pushed payload, when this transport receives any.
    ///
    /// The direct connection gets its messages from the socket, so webhook
    /// bodies addressed to it are dropped here.
    pub fn normalize_webhook(&self, payload: &serde_json::Value) -> Option<IncomingMessage> {
        match self {
            Self::Baileys(_) => {
                debug!("ignoring webhook payload: direct connection receives via socket");
                None
            },
            Self::Webhook(channel) => channel.normalize(payload),
            Self::CloudApi(channel) => channel.normalize(payload),
        }
    }
}
