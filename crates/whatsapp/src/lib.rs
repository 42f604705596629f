//! Direct WhatsApp Web connection via a Baileys sidecar.
//!
//! The Node sidecar owns the wire protocol (encryption, delivery receipts,
//! history) and speaks a small JSON control protocol to us over a local
//! WebSocket. This crate owns everything above that line: the connection
//! lifecycle state machine (QR handshake, reconnect backoff, terminal
//! logout), the sidecar process supervision, and QR rendering.

pub mod manager;
pub mod process;
pub mod qr;
pub mod sidecar;
pub mod transport;
pub mod types;

pub use {
    manager::{ConnectionManager, ManagerConfig},
    process::{SidecarProcess, SidecarProcessConfig, start_sidecar},
    qr::{render_qr_png, render_qr_terminal},
    sidecar::{DEFAULT_SIDECAR_PORT, SidecarTransport},
    transport::{Transport, TransportHandle},
    types::{CloseReason, ConnectionSnapshot, ConnectionStatus, TransportEvent},
};
