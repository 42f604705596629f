//! Message orchestration: route → agent → reply.
//!
//! The dispatcher glues the routing engine, the agent client, and the
//! configured provider into the end-to-end flow, and owns the inbound pump
//! that fans messages from the direct connection into independent tasks.

pub mod dispatcher;
pub mod provider;

pub use {
    dispatcher::{DispatchOutcome, Dispatcher, spawn_inbound_pump},
    provider::Provider,
};
