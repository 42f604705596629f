//! Hosted cloud-API channel.
//!
//! Sends go through the hosted `/{phone_id}/messages` endpoint; inbound
//! events arrive in the hosted webhook envelope
//! (`entry[].changes[].value.messages[]`). Kept minimal: text in, text out.

use {
    chrono::{DateTime, Utc},
    courier_common::{IncomingMessage, Metadata, OutgoingMessage},
    serde::Serialize,
    tracing::warn,
};

use crate::error::ChannelError;

#[derive(Serialize)]
struct CloudSendRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    text: CloudSendText<'a>,
}

#[derive(Serialize)]
struct CloudSendText<'a> {
    body: &'a str,
}

#[derive(Clone)]
pub struct CloudApiChannel {
    client: reqwest::Client,
    api_url: String,
    phone_id: String,
    token: String,
}

impl CloudApiChannel {
    pub fn new(
        api_url: impl Into<String>,
        phone_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            phone_id: phone_id.into(),
            token: token.into(),
        }
    }

    pub async fn send(&self, message: &OutgoingMessage) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(format!("{}/{}/messages", self.api_url, self.phone_id))
            .bearer_auth(&self.token)
            .json(&CloudSendRequest {
                messaging_product: "whatsapp",
                to: &message.to,
                text: CloudSendText {
                    body: &message.text,
                },
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
        Ok(())
    }

    /// Normalize the hosted webhook envelope. Only text messages are
    /// supported; everything else is a `None`.
    pub fn normalize(&self, payload: &serde_json::Value) -> Option<IncomingMessage> {
        let message = payload
            .get("entry")?
            .get(0)?
            .get("changes")?
            .get(0)?
            .get("value")?
            .get("messages")?
            .get(0)?;

        let from = message.get("from").and_then(|v| v.as_str())?;
        let Some(text) = message
            .get("text")
            .and_then(|t| t.get("body"))
            .and_then(|v| v.as_str())
        else {
            warn!(from, "cloud webhook message without text body, dropping");
            return None;
        };

        let id = message
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(IncomingMessage::generated_id);
        let timestamp = message
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        Some(IncomingMessage {
            id,
            from: from.to_string(),
            channel_id: crate::jid::derive_channel_id(from),
            text: text.to_string(),
            timestamp,
            metadata: Metadata::new(),
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_hosted_envelope() {
        let channel = CloudApiChannel::new("http://api", "12345", "tok");
        let payload = serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "from": "549112345678",
                            "id": "wamid.1",
                            "timestamp": "1700000000",
                            "text": { "body": "hi" },
                        }],
                    },
                }],
            }],
        });

        let msg = channel.normalize(&payload).unwrap();
        assert_eq!(msg.id, "wamid.1");
        assert_eq!(msg.channel_id, "549112345678");
        assert_eq!(msg.text, "hi");
        assert_eq!(msg.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn non_text_messages_are_dropped() {
        let channel = CloudApiChannel::new("http://api", "12345", "tok");
        let payload = serde_json::json!({
            "entry": [{ "changes": [{ "value": { "messages": [{ "from": "1", "image": {} }] } }] }],
        });
        assert!(channel.normalize(&payload).is_none());
        assert!(channel.normalize(&serde_json::json!({})).is_none());
    }

    #[tokio::test]
    async fn send_targets_phone_scoped_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/12345/messages")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let channel = CloudApiChannel::new(server.url(), "12345", "tok");
        let message = OutgoingMessage {
            to: "549112345678".into(),
            channel_id: "549112345678".into(),
            text: "hello".into(),
            metadata: None,
        };
        channel.send(&message).await.unwrap();
        mock.assert_async().await;
    }
}
