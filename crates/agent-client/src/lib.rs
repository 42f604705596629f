//! HTTP client for agent backends speaking the turn-based run protocol.
//!
//! One outbound request per inbound message: `POST {base_url}/run` with the
//! serialized message, a bounded wait (default 30 s), and the reply read
//! from the last model-authored turn event. A timeout cancels the in-flight
//! request and surfaces as an error distinguishable from a network failure.

pub mod client;
pub mod error;
pub mod protocol;

pub use {
    client::{AgentClient, AgentEndpoint, SessionIdFn, validate_endpoint},
    error::AgentError,
    protocol::{RunRequest, TurnEvent},
};
