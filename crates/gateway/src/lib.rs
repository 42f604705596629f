//! HTTP surface of the gateway: health, provider webhooks, route
//! management, and connection status endpoints.

pub mod envelope;
pub mod route_api;
pub mod server;
pub mod whatsapp_api;

pub use server::{AppState, build_app, serve};
