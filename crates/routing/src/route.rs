use {courier_common::Environment, serde::{Deserialize, Serialize}};

/// Reserved channel key matched when no specific route applies.
pub const WILDCARD_CHANNEL: &str = "*";

/// A routing rule: which agent handles messages for a channel.
///
/// `channel_id` is the unique repository key; at most one route exists per
/// channel. Routes are created and mutated only through the management API —
/// the routing core treats them as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub channel_id: String,
    /// Base URL of the agent backend for this channel.
    pub agent_endpoint: String,
    #[serde(default)]
    pub environment: Environment,
    /// Admission filter: the route matches only if the incoming text
    /// matches this regular expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_filter: Option<String>,
    /// Per-route overrides merged over client defaults (agent app name,
    /// base URL, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl Route {
    pub fn new(channel_id: impl Into<String>, agent_endpoint: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            agent_endpoint: agent_endpoint.into(),
            environment: Environment::default(),
            regex_filter: None,
            config: None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.channel_id == WILDCARD_CHANNEL
    }
}
