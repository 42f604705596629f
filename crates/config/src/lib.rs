//! Environment-driven configuration.
//!
//! Everything is a plain `COURIER_*` variable (plus a `PORT` fallback) read
//! once at startup — no config file, no nested document. Per-route agent
//! overrides are applied by [`merge_agent_settings`], the single place where
//! the defaults ← environment ← route layering happens.

pub mod merge;
pub mod settings;

pub use {
    merge::merge_agent_settings,
    settings::{AgentSettings, GatewayConfig, ProviderKind},
};
