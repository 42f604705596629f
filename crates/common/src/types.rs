//! Domain message shapes shared by normalizers, routing, and dispatch.
//!
//! These are the provider-agnostic types every transport converts into (and
//! out of). They are plain immutable values: constructed once at a boundary,
//! then only read.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Opaque provider-specific extras (group flag, push name, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A normalized inbound message, produced by a channel normalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Provider-assigned message id (generated when the provider omits one).
    pub id: String,
    /// Raw sender identifier as the provider reported it (e.g. a JID).
    pub from: String,
    /// Normalized routing key derived from `from`.
    pub channel_id: String,
    /// Extracted body text. Non-text content yields a bracketed placeholder.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl IncomingMessage {
    /// Generate a fallback message id for payloads that omit one.
    pub fn generated_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// A reply on its way back out through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Raw destination identifier (the originating `from` of the inbound).
    pub to: String,
    pub channel_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Outcome of one agent call, as seen by the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Deployment environment a route targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Lab,
    Prod,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lab => f.write_str("lab"),
            Self::Prod => f.write_str("prod"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lab" => Ok(Self::Lab),
            "prod" => Ok(Self::Prod),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_round_trips_through_serde() {
        let json = serde_json::to_string(&Environment::Prod).unwrap();
        assert_eq!(json, "\"prod\"");
        let back: Environment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Environment::Prod);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(
            IncomingMessage::generated_id(),
            IncomingMessage::generated_id()
        );
    }
}
