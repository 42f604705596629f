//! Connection lifecycle state machine.
//!
//! `disconnected → connecting → {qr_ready, connected} → disconnected`.
//!
//! One manager exists per process, constructed at startup and passed by
//! handle to everything that sends or reads connection state. Transport
//! events arrive on an mpsc channel; normalized inbound messages leave on
//! another, so routing logic never sees transport callbacks.

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex as StdMutex, RwLock as StdRwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    anyhow::{Context, Result, bail},
    courier_channels::{MessageFilter, normalize_frame},
    courier_common::IncomingMessage,
    futures::future::BoxFuture,
    tokio::sync::{RwLock, mpsc},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    transport::{Transport, TransportHandle},
    types::{CloseReason, ConnectionSnapshot, ConnectionStatus, TransportEvent},
};

/// Automatic reconnection stops after this many consecutive failures.
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// `min(1000 * 2^attempt, 30000)` ms, attempt counted from 1.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = 1000u64.saturating_mul(2u64.saturating_pow(attempt)).min(30_000);
    Duration::from_millis(ms)
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory with persisted auth credentials.
    pub auth_dir: PathBuf,
    pub filter: MessageFilter,
    /// Capacity of the normalized-inbound channel.
    pub inbound_buffer: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            auth_dir: PathBuf::from("./auth"),
            filter: MessageFilter::default(),
            inbound_buffer: 64,
        }
    }
}

struct State {
    status: ConnectionStatus,
    qr_code: Option<String>,
    last_error: Option<String>,
    reconnect_attempts: u32,
}

pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    config: ManagerConfig,
    state: StdRwLock<State>,
    handle: RwLock<Option<Box<dyn TransportHandle>>>,
    inbound_tx: mpsc::Sender<IncomingMessage>,
    inbound_rx: StdMutex<Option<mpsc::Receiver<IncomingMessage>>>,
    /// Cancels pending reconnect timers on explicit disconnect.
    reconnect_cancel: StdMutex<CancellationToken>,
    /// Bumped on every connect/disconnect so stale event loops stand down.
    epoch: AtomicU64,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, config: ManagerConfig) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_buffer.max(1));
        Arc::new(Self {
            transport,
            config,
            state: StdRwLock::new(State {
                status: ConnectionStatus::Disconnected,
                qr_code: None,
                last_error: None,
                reconnect_attempts: 0,
            }),
            handle: RwLock::new(None),
            inbound_tx,
            inbound_rx: StdMutex::new(Some(inbound_rx)),
            reconnect_cancel: StdMutex::new(CancellationToken::new()),
            epoch: AtomicU64::new(0),
        })
    }

    /// Take the normalized-inbound receiver. Yields `Some` exactly once;
    /// there is one consumer (the dispatcher's pump).
    pub fn take_inbound(&self) -> Option<mpsc::Receiver<IncomingMessage>> {
        self.inbound_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        ConnectionSnapshot {
            status: state.status,
            qr_code: state.qr_code.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Open the transport session. No-op while already connecting or
    /// connected — only one connect sequence may be active at a time.
    ///
    /// Open failures revert to `Disconnected` with the error recorded and
    /// are NOT retried automatically; only post-connection drops enter the
    /// backoff loop.
    ///
    /// Boxed so the reconnect path can await it recursively.
    pub fn connect(self: &Arc<Self>) -> BoxFuture<'static, Result<()>> {
        let this = Arc::clone(self);
        Box::pin(async move {
            {
                let mut state = this.state.write().unwrap_or_else(|e| e.into_inner());
                if matches!(
                    state.status,
                    ConnectionStatus::Connecting | ConnectionStatus::Connected
                ) {
                    debug!(status = state.status.as_str(), "connect is a no-op");
                    return Ok(());
                }
                state.status = ConnectionStatus::Connecting;
                state.qr_code = None;
                state.last_error = None;
            }
            let epoch = this.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            {
                // A fresh connect re-arms reconnect scheduling after an explicit
                // disconnect cancelled the previous token.
                let mut cancel = this.reconnect_cancel.lock().unwrap_or_else(|e| e.into_inner());
                if cancel.is_cancelled() {
                    *cancel = CancellationToken::new();
                }
            }

            info!(auth_dir = %this.config.auth_dir.display(), "opening transport session");
            let (events_tx, events_rx) = mpsc::channel(64);
            let handle = match this.transport.open(&this.config.auth_dir, events_tx).await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(error = %e, "transport open failed");
                    let mut state = this.state.write().unwrap_or_else(|e| e.into_inner());
                    state.status = ConnectionStatus::Disconnected;
                    state.last_error = Some(e.to_string());
                    return Err(e).context("failed to open transport session");
                },
            };
            {
                let mut slot = this.handle.write().await;
                // disconnect() may have run while open was in flight; a stale
                // epoch means the session must not be kept.
                if this.epoch.load(Ordering::SeqCst) != epoch {
                    drop(slot);
                    debug!("connect superseded while opening, closing session");
                    if let Err(e) = handle.close().await {
                        warn!(error = %e, "failed to close superseded session");
                    }
                    return Ok(());
                }
                *slot = Some(handle);
            }

            let manager = Arc::clone(&this);
            tokio::spawn(async move {
                manager.run_event_loop(epoch, events_rx).await;
            });
            Ok(())
        })
    }

    /// Explicit operator teardown: close the session now, cancel any pending
    /// reconnect, end in `Disconnected` with no error recorded.
    pub async fn disconnect(&self) -> Result<()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        {
            let cancel = self.reconnect_cancel.lock().unwrap_or_else(|e| e.into_inner());
            cancel.cancel();
        }
        if let Some(handle) = self.handle.write().await.take() {
            handle.close().await?;
        }
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.status = ConnectionStatus::Disconnected;
        state.qr_code = None;
        state.last_error = None;
        info!("transport session closed by operator");
        Ok(())
    }

    /// Send a text to a raw recipient identifier over the live session.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        if self.snapshot().status != ConnectionStatus::Connected {
            bail!("not connected");
        }
        let handle = self.handle.read().await;
        match handle.as_ref() {
            Some(handle) => handle.send_text(to, text).await,
            None => bail!("not connected"),
        }
    }

    async fn run_event_loop(
        self: Arc<Self>,
        epoch: u64,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!("stale transport event loop standing down");
                return;
            }
            match event {
                TransportEvent::Qr(qr) => {
                    info!("QR code issued, waiting for scan");
                    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                    state.status = ConnectionStatus::QrReady;
                    state.qr_code = Some(qr);
                    state.last_error = None;
                },
                TransportEvent::Open => {
                    info!("connection open");
                    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                    state.status = ConnectionStatus::Connected;
                    state.qr_code = None;
                    state.last_error = None;
                    state.reconnect_attempts = 0;
                },
                TransportEvent::Inbound(frame) => {
                    if self.config.filter.verdict(&frame).is_some() {
                        continue;
                    }
                    if let Some(message) = normalize_frame(&frame) {
                        debug!(
                            message_id = %message.id,
                            channel_id = %message.channel_id,
                            "inbound message"
                        );
                        if self.inbound_tx.send(message).await.is_err() {
                            warn!("inbound consumer gone, dropping message");
                        }
                    }
                },
                TransportEvent::Close { reason, detail } => {
                    self.handle_close(reason, detail).await;
                    return;
                },
            }
        }
        debug!("transport event stream ended");
    }

    async fn handle_close(self: &Arc<Self>, reason: CloseReason, detail: String) {
        warn!(?reason, detail = %detail, "connection closed");
        self.handle.write().await.take();

        let attempt = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.status = ConnectionStatus::Disconnected;
            state.qr_code = None;
            state.last_error = Some(detail);

            if reason == CloseReason::LoggedOut {
                info!("session logged out; re-authenticate with a fresh QR scan");
                return;
            }
            if state.reconnect_attempts >= MAX_RECONNECT_ATTEMPTS {
                warn!(
                    attempts = state.reconnect_attempts,
                    "reconnect ceiling reached, staying disconnected"
                );
                return;
            }
            state.reconnect_attempts += 1;
            state.reconnect_attempts
        };

        let delay = backoff_delay(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");

        let cancel = self
            .reconnect_cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("pending reconnect cancelled");
                },
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = manager.connect().await {
                        warn!(error = %e, "scheduled reconnect failed");
                    }
                },
            }
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use async_trait::async_trait;

    use super::*;

    /// What a scripted session does right after opening.
    #[derive(Clone, Copy)]
    enum OpenScript {
        QrThenOpen,
        CloseOther,
        CloseLoggedOut,
        Silent,
    }

    struct ScriptedTransport {
        opens: AtomicUsize,
        fail_open: AtomicBool,
        script: StdMutex<OpenScript>,
        /// Keeps each session's event sender alive so the loop survives.
        senders: StdMutex<Vec<mpsc::Sender<TransportEvent>>>,
    }

    impl ScriptedTransport {
        fn new(script: OpenScript) -> Arc<Self> {
            Arc::new(Self {
                opens: AtomicUsize::new(0),
                fail_open: AtomicBool::new(false),
                script: StdMutex::new(script),
                senders: StdMutex::new(Vec::new()),
            })
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        fn set_script(&self, script: OpenScript) {
            *self.script.lock().unwrap() = script;
        }

        async fn emit(&self, event: TransportEvent) {
            let sender = self.senders.lock().unwrap().last().cloned().unwrap();
            sender.send(event).await.unwrap();
        }
    }

    struct NoopHandle;

    #[async_trait]
    impl TransportHandle for NoopHandle {
        async fn send_text(&self, _to: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn open(
            &self,
            _auth_dir: &std::path::Path,
            events: mpsc::Sender<TransportEvent>,
        ) -> Result<Box<dyn TransportHandle>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open.load(Ordering::SeqCst) {
                bail!("sidecar unreachable");
            }
            self.senders.lock().unwrap().push(events.clone());
            let script = *self.script.lock().unwrap();
            tokio::spawn(async move {
                match script {
                    OpenScript::QrThenOpen => {
                        let _ = events.send(TransportEvent::Qr("qr-data".into())).await;
                    },
                    OpenScript::CloseOther => {
                        let _ = events
                            .send(TransportEvent::Close {
                                reason: CloseReason::Other,
                                detail: "stream errored".into(),
                            })
                            .await;
                    },
                    OpenScript::CloseLoggedOut => {
                        let _ = events
                            .send(TransportEvent::Close {
                                reason: CloseReason::LoggedOut,
                                detail: "logged out".into(),
                            })
                            .await;
                    },
                    OpenScript::Silent => {},
                }
            });
            Ok(Box::new(NoopHandle))
        }
    }

    async fn settle() {
        // Let spawned tasks and (paused-time) timers run.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    fn frame(jid: &str, from_me: bool, text: &str) -> courier_channels::RawMessageFrame {
        serde_json::from_value(serde_json::json!({
            "key": { "remoteJid": jid, "id": "m1", "fromMe": from_me },
            "message": { "conversation": text },
        }))
        .unwrap()
    }

    #[test]
    fn backoff_sequence_is_capped_exponential() {
        let delays: Vec<u64> = (1..=5).map(|a| backoff_delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000]);
        assert_eq!(backoff_delay(10).as_millis(), 30_000);
    }

    #[tokio::test]
    async fn qr_event_moves_state_to_qr_ready() {
        let transport = ScriptedTransport::new(OpenScript::QrThenOpen);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        manager.connect().await.unwrap();
        settle().await;

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::QrReady);
        assert_eq!(snapshot.qr_code.as_deref(), Some("qr-data"));
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn open_event_clears_qr_and_resets_attempts() {
        let transport = ScriptedTransport::new(OpenScript::QrThenOpen);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        manager.connect().await.unwrap();
        settle().await;
        transport.emit(TransportEvent::Open).await;
        settle().await;

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::Connected);
        assert!(snapshot.qr_code.is_none());
        assert!(snapshot.connected());
    }

    #[tokio::test]
    async fn connect_is_a_no_op_while_connected() {
        let transport = ScriptedTransport::new(OpenScript::Silent);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        manager.connect().await.unwrap();
        settle().await;
        transport.emit(TransportEvent::Open).await;
        settle().await;

        manager.connect().await.unwrap();
        manager.connect().await.unwrap();
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn open_failure_records_error_and_does_not_retry() {
        let transport = ScriptedTransport::new(OpenScript::Silent);
        transport.fail_open.store(true, Ordering::SeqCst);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        assert!(manager.connect().await.is_err());
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
        assert!(snapshot.last_error.unwrap().contains("sidecar unreachable"));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_logout_close_reconnects_up_to_the_ceiling() {
        let transport = ScriptedTransport::new(OpenScript::CloseOther);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        manager.connect().await.unwrap();
        // Initial open plus 5 scheduled reconnects, each closing again.
        for _ in 0..200 {
            settle().await;
            tokio::time::sleep(Duration::from_secs(31)).await;
        }

        assert_eq!(transport.opens(), 6);
        assert_eq!(manager.snapshot().status, ConnectionStatus::Disconnected);
        assert!(manager.snapshot().last_error.is_some());

        // No 6th automatic attempt, however long we wait.
        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(transport.opens(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn logged_out_close_is_terminal() {
        let transport = ScriptedTransport::new(OpenScript::CloseLoggedOut);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        manager.connect().await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;

        assert_eq!(transport.opens(), 1);
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
        assert_eq!(snapshot.last_error.as_deref(), Some("logged out"));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let transport = ScriptedTransport::new(OpenScript::CloseOther);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        manager.connect().await.unwrap();
        settle().await;
        assert_eq!(transport.opens(), 1);

        manager.disconnect().await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;

        assert_eq!(transport.opens(), 1);
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
        assert!(snapshot.last_error.is_none());
    }

    struct GatedTransport {
        release: tokio::sync::Notify,
        closed: Arc<AtomicBool>,
    }

    struct ClosableHandle {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl TransportHandle for ClosableHandle {
        async fn send_text(&self, _to: &str, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn open(
            &self,
            _auth_dir: &std::path::Path,
            _events: mpsc::Sender<TransportEvent>,
        ) -> Result<Box<dyn TransportHandle>> {
            self.release.notified().await;
            Ok(Box::new(ClosableHandle { closed: Arc::clone(&self.closed) }))
        }
    }

    #[tokio::test]
    async fn disconnect_during_open_closes_the_late_session() {
        let transport = Arc::new(GatedTransport {
            release: tokio::sync::Notify::new(),
            closed: Arc::new(AtomicBool::new(false)),
        });
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        let connecting = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.connect().await }
        });
        settle().await;

        manager.disconnect().await.unwrap();
        transport.release.notify_one();
        connecting.await.unwrap().unwrap();
        settle().await;

        // The session that finished opening after teardown must not linger.
        assert!(transport.closed.load(Ordering::SeqCst));
        assert!(manager.handle.read().await.is_none());
        assert_eq!(manager.snapshot().status, ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn inbound_frames_are_filtered_and_normalized() {
        let transport = ScriptedTransport::new(OpenScript::Silent);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());
        let mut inbound = manager.take_inbound().unwrap();
        assert!(manager.take_inbound().is_none());

        manager.connect().await.unwrap();
        settle().await;
        transport.emit(TransportEvent::Open).await;
        settle().await;

        // Own message: dropped by the default filter.
        transport
            .emit(TransportEvent::Inbound(frame("549@s.whatsapp.net", true, "me")))
            .await;
        // External message: delivered.
        transport
            .emit(TransportEvent::Inbound(frame("549@s.whatsapp.net", false, "hi")))
            .await;

        let message = inbound.recv().await.unwrap();
        assert_eq!(message.text, "hi");
        assert_eq!(message.channel_id, "549");
        assert!(inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_text_requires_a_connected_session() {
        let transport = ScriptedTransport::new(OpenScript::Silent);
        let manager = ConnectionManager::new(transport.clone(), ManagerConfig::default());

        assert!(manager.send_text("549@s.whatsapp.net", "hi").await.is_err());

        manager.connect().await.unwrap();
        settle().await;
        transport.emit(TransportEvent::Open).await;
        settle().await;

        manager.send_text("549@s.whatsapp.net", "hi").await.unwrap();
    }
}
