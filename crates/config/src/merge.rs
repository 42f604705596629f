//! Layered agent-config merge.

use crate::settings::AgentSettings;

/// Produce the effective agent settings for one route.
///
/// Layering, lowest precedence first: built-in defaults (already folded into
/// `defaults` at startup) ← environment (ditto) ← the route's
/// `agent_endpoint` ← the route's `config` overrides. This is the only place
/// route config is merged; callers never poke at the layers themselves.
///
/// Recognized `config` keys: `app_name`, `base_url`, `timeout_secs`.
/// Unknown keys are ignored so routes can carry provider-specific extras.
pub fn merge_agent_settings(
    defaults: &AgentSettings,
    route_endpoint: &str,
    route_config: Option<&serde_json::Value>,
) -> AgentSettings {
    let mut merged = defaults.clone();
    if !route_endpoint.is_empty() {
        merged.base_url = route_endpoint.to_string();
    }

    let Some(overrides) = route_config.and_then(|c| c.as_object()) else {
        return merged;
    };

    if let Some(app) = overrides.get("app_name").and_then(|v| v.as_str()) {
        merged.app_name = app.to_string();
    }
    if let Some(url) = overrides.get("base_url").and_then(|v| v.as_str()) {
        merged.base_url = url.to_string();
    }
    if let Some(secs) = overrides.get("timeout_secs").and_then(|v| v.as_u64()) {
        merged.timeout_secs = secs;
    }
    merged
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AgentSettings {
        AgentSettings {
            app_name: "default".into(),
            base_url: "http://env-agent:8000".into(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn route_endpoint_overrides_environment_base_url() {
        let merged = merge_agent_settings(&defaults(), "http://route-agent:9000", None);
        assert_eq!(merged.base_url, "http://route-agent:9000");
        assert_eq!(merged.app_name, "default");
    }

    #[test]
    fn route_config_wins_over_endpoint_and_env() {
        let config = serde_json::json!({
            "app_name": "support",
            "base_url": "http://override:1234",
            "timeout_secs": 5,
        });
        let merged = merge_agent_settings(&defaults(), "http://route-agent:9000", Some(&config));
        assert_eq!(merged.app_name, "support");
        assert_eq!(merged.base_url, "http://override:1234");
        assert_eq!(merged.timeout_secs, 5);
    }

    #[test]
    fn empty_endpoint_keeps_environment_base_url() {
        let merged = merge_agent_settings(&defaults(), "", None);
        assert_eq!(merged.base_url, "http://env-agent:8000");
    }

    #[test]
    fn unknown_and_mistyped_keys_are_ignored() {
        let config = serde_json::json!({ "app_name": 42, "color": "blue" });
        let merged = merge_agent_settings(&defaults(), "", Some(&config));
        assert_eq!(merged.app_name, "default");
    }
}
