//! Shared domain types used across all courier crates.

pub mod types;

pub use types::{AgentResponse, Environment, IncomingMessage, Metadata, OutgoingMessage};
