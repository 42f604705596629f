use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which transport receives messages from the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Direct persistent connection via the Baileys sidecar.
    #[default]
    Baileys,
    /// Inbound provider webhooks; sends go out over the cloud HTTP API.
    Webhook,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baileys" => Ok(Self::Baileys),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Default agent call parameters, overridable per route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Agent application name for the run protocol.
    pub app_name: String,
    /// Base URL of the agent backend.
    pub base_url: String,
    /// Bounded wait per agent call.
    pub timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            app_name: "default".into(),
            base_url: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Process-wide configuration, loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: ProviderKind,
    pub port: u16,
    pub debug: bool,
    /// Directory holding Baileys auth state (credentials, keys).
    pub auth_dir: PathBuf,
    /// SQLite path for route storage. `None` keeps routes in memory.
    pub database: Option<String>,
    pub sidecar_dir: Option<PathBuf>,
    pub sidecar_port: u16,
    /// Cloud API endpoint + credentials for webhook-mode sends.
    pub webhook_api_url: Option<String>,
    pub webhook_api_key: Option<String>,
    pub agent: AgentSettings,
    /// Sender identifiers dropped by the prefilter.
    pub denylist: Vec<String>,
    pub ignore_groups: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            port: 3000,
            debug: false,
            auth_dir: PathBuf::from("./auth"),
            database: None,
            sidecar_dir: None,
            sidecar_port: 3901,
            webhook_api_url: None,
            webhook_api_key: None,
            agent: AgentSettings::default(),
            denylist: Vec::new(),
            ignore_groups: false,
        }
    }
}

impl GatewayConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load via an arbitrary lookup function (tests inject a map here).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_bool = |v: &str| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");

        Self {
            provider: lookup("COURIER_PROVIDER")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.provider),
            port: lookup("COURIER_PORT")
                .or_else(|| lookup("PORT"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            debug: lookup("COURIER_DEBUG")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.debug),
            auth_dir: lookup("COURIER_AUTH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.auth_dir),
            database: lookup("COURIER_DB"),
            sidecar_dir: lookup("COURIER_SIDECAR_DIR").map(PathBuf::from),
            sidecar_port: lookup("COURIER_SIDECAR_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sidecar_port),
            webhook_api_url: lookup("COURIER_WEBHOOK_API_URL"),
            webhook_api_key: lookup("COURIER_WEBHOOK_API_KEY"),
            agent: AgentSettings {
                app_name: lookup("COURIER_AGENT_APP").unwrap_or(defaults.agent.app_name),
                base_url: lookup("COURIER_AGENT_URL").unwrap_or(defaults.agent.base_url),
                timeout_secs: lookup("COURIER_AGENT_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.agent.timeout_secs),
            },
            denylist: lookup("COURIER_DENYLIST")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            ignore_groups: lookup("COURIER_IGNORE_GROUPS")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.ignore_groups),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let cfg = GatewayConfig::from_lookup(|_| None);
        assert_eq!(cfg.provider, ProviderKind::Baileys);
        assert_eq!(cfg.port, 3000);
        assert!(!cfg.debug);
        assert!(cfg.database.is_none());
        assert_eq!(cfg.agent.timeout_secs, 30);
    }

    #[test]
    fn env_values_override_defaults() {
        let map = HashMap::from([
            ("COURIER_PROVIDER", "webhook"),
            ("COURIER_PORT", "8080"),
            ("COURIER_DEBUG", "true"),
            ("COURIER_DENYLIST", "111, 222 ,"),
            ("COURIER_IGNORE_GROUPS", "1"),
        ]);
        let cfg = GatewayConfig::from_lookup(lookup(&map));
        assert_eq!(cfg.provider, ProviderKind::Webhook);
        assert_eq!(cfg.port, 8080);
        assert!(cfg.debug);
        assert_eq!(cfg.denylist, vec!["111", "222"]);
        assert!(cfg.ignore_groups);
    }

    #[test]
    fn plain_port_is_a_fallback() {
        let map = HashMap::from([("PORT", "9000")]);
        assert_eq!(GatewayConfig::from_lookup(lookup(&map)).port, 9000);

        let map = HashMap::from([("PORT", "9000"), ("COURIER_PORT", "3111")]);
        assert_eq!(GatewayConfig::from_lookup(lookup(&map)).port, 3111);
    }

    #[test]
    fn unparsable_values_fall_back_to_defaults() {
        let map = HashMap::from([("COURIER_PORT", "not-a-port"), ("COURIER_PROVIDER", "smoke")]);
        let cfg = GatewayConfig::from_lookup(lookup(&map));
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.provider, ProviderKind::Baileys);
    }
}
