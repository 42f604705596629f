//! Route inbound messages to agent backends.
//!
//! Decision order (first match wins):
//! 1. Route keyed by the message's `channel_id` (filter must pass if set)
//! 2. Wildcard route (`"*"`, filter must pass if set)
//! 3. No route
//!
//! A specific route whose regex filter rejects the text does NOT stop the
//! lookup — evaluation falls through to the wildcard as if the specific
//! route did not exist. A filter that fails to compile is treated as a
//! non-match (fail closed), never as an error.

pub mod engine;
pub mod route;
pub mod store;

pub use {
    engine::RoutingEngine,
    route::{Route, WILDCARD_CHANNEL},
    store::RouteStore,
};
