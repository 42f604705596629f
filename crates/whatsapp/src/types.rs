//! Connection state and the sidecar control protocol.

use {courier_channels::RawMessageFrame, serde::{Deserialize, Serialize}};

/// Lifecycle states of the direct connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    QrReady,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::QrReady => "qr_ready",
            Self::Connected => "connected",
        }
    }
}

/// Read-only view of the connection for status endpoints.
///
/// `qr_code` is only populated in `QrReady`; `last_error` only in
/// `Disconnected` after a failure. The manager enforces both.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub qr_code: Option<String>,
    pub last_error: Option<String>,
}

impl ConnectionSnapshot {
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            qr_code: None,
            last_error: None,
        }
    }

    pub fn connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Why the transport dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Credentials were revoked. Terminal: no automatic reconnection, the
    /// operator must re-authenticate with a fresh QR scan.
    LoggedOut,
    /// Anything else (network drop, server restart, ...). Retriable.
    Other,
}

/// Events the transport pushes to the connection manager.
#[derive(Debug)]
pub enum TransportEvent {
    /// A QR payload to present for pairing.
    Qr(String),
    /// Session is open and authenticated.
    Open,
    /// Session dropped.
    Close { reason: CloseReason, detail: String },
    /// An inbound message frame, pre-normalization.
    Inbound(RawMessageFrame),
}

// ── Sidecar wire protocol ───────────────────────────────────────────────────

/// Baileys' status code for a revoked session.
pub const LOGGED_OUT_CODE: i64 = 401;

/// Commands we send to the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayCommand {
    Login { auth_dir: String },
    Logout,
    Send { to: String, text: String },
}

/// Frames the sidecar sends us.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarEvent {
    Qr {
        qr: String,
    },
    Open,
    Close {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        message: Option<String>,
    },
    Message {
        frame: RawMessageFrame,
    },
    SendResult {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

impl SidecarEvent {
    /// Map a sidecar frame to the transport event the manager consumes.
    pub fn into_transport_event(self) -> Option<TransportEvent> {
        match self {
            Self::Qr { qr } => Some(TransportEvent::Qr(qr)),
            Self::Open => Some(TransportEvent::Open),
            Self::Close { code, message } => {
                let reason = if code == Some(LOGGED_OUT_CODE) {
                    CloseReason::LoggedOut
                } else {
                    CloseReason::Other
                };
                Some(TransportEvent::Close {
                    reason,
                    detail: message.unwrap_or_else(|| "connection closed".into()),
                })
            },
            Self::Message { frame } => Some(TransportEvent::Inbound(frame)),
            // Send acknowledgements are logged at the sidecar layer.
            Self::SendResult { .. } => None,
        }
    }
}
