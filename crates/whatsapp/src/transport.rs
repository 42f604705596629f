//! Transport seam between the connection manager and the wire.
//!
//! The manager never touches WebSockets or the sidecar process directly; it
//! opens a [`Transport`], receives [`TransportEvent`]s on a channel, and
//! sends through the returned handle. Tests drive the state machine with a
//! scripted transport.

use std::path::Path;

use {anyhow::Result, async_trait::async_trait, tokio::sync::mpsc};

use crate::types::TransportEvent;

/// Factory for transport sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session using the persisted auth state in `auth_dir`.
    ///
    /// Lifecycle and message events are pushed into `events`. Dropping the
    /// returned handle (or calling [`TransportHandle::close`]) tears the
    /// session down.
    async fn open(
        &self,
        auth_dir: &Path,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn TransportHandle>>;
}

/// One live transport session.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Send a text message to a raw recipient identifier.
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;

    /// Tear the session down immediately. Does NOT log out — credentials
    /// stay valid for the next `open`.
    async fn close(&self) -> Result<()>;
}
