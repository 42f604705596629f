//! WebSocket control connection to the Baileys sidecar.
//!
//! Implements [`Transport`] over `ws://127.0.0.1:{port}`: commands go out as
//! JSON text frames, sidecar events come back the same way and are fanned
//! into the manager's event channel.

use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    futures::{SinkExt, StreamExt, stream::SplitSink},
    tokio::{net::TcpStream, sync::{Mutex, RwLock, mpsc}},
    tokio_tungstenite::{
        MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
    },
    tracing::{debug, warn},
};

use crate::{
    process::{SidecarProcess, SidecarProcessConfig, find_sidecar_dir, start_sidecar},
    transport::{Transport, TransportHandle},
    types::{CloseReason, GatewayCommand, SidecarEvent, TransportEvent},
};

pub const DEFAULT_SIDECAR_PORT: u16 = 3901;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Production transport: supervises the sidecar process and speaks its
/// control protocol.
pub struct SidecarTransport {
    port: u16,
    sidecar_dir: Option<std::path::PathBuf>,
    auto_start: bool,
    process: RwLock<Option<SidecarProcess>>,
}

impl SidecarTransport {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            sidecar_dir: None,
            auto_start: true,
            process: RwLock::new(None),
        }
    }

    pub fn with_sidecar_dir(mut self, dir: std::path::PathBuf) -> Self {
        self.sidecar_dir = Some(dir);
        self
    }

    /// Skip process management; connect to an externally run sidecar.
    pub fn without_auto_start(mut self) -> Self {
        self.auto_start = false;
        self
    }

    /// Stop the supervised sidecar process, if we started one.
    pub async fn stop_process(&self) -> Result<()> {
        if let Some(mut process) = self.process.write().await.take() {
            process.stop().await?;
        }
        Ok(())
    }

    async fn ensure_process_running(&self, auth_dir: &Path) -> Result<()> {
        let mut process = self.process.write().await;
        if let Some(ref mut proc) = *process {
            if proc.is_running() {
                return Ok(());
            }
            warn!("sidecar process died, restarting");
        }

        let dir = find_sidecar_dir(self.sidecar_dir.as_deref())?;
        let proc = start_sidecar(SidecarProcessConfig {
            dir,
            port: self.port,
            auth_dir: Some(auth_dir.to_path_buf()),
        })
        .await?;
        *process = Some(proc);
        Ok(())
    }

    async fn connect_ws(&self) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let url = format!("ws://127.0.0.1:{}", self.port);
        // The process may still be starting; retry with a short linear delay.
        let mut last_err = None;
        for attempt in 0..10u32 {
            match connect_async(&url).await {
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    debug!(attempt, error = %e, "sidecar websocket not ready");
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(300 * (attempt as u64 + 1))).await;
                },
            }
        }
        match last_err {
            Some(e) => Err(e).context("failed to reach sidecar websocket"),
            None => bail!("failed to reach sidecar websocket"),
        }
    }
}

#[async_trait]
impl Transport for SidecarTransport {
    async fn open(
        &self,
        auth_dir: &Path,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn TransportHandle>> {
        if self.auto_start {
            self.ensure_process_running(auth_dir).await?;
        }

        let stream = self.connect_ws().await?;
        let (sink, mut source) = stream.split();
        let sink = Arc::new(Mutex::new(sink));

        send_command(
            &sink,
            &GatewayCommand::Login {
                auth_dir: auth_dir.display().to_string(),
            },
        )
        .await?;

        // Reader task: sidecar frames → transport events. Ends (and tells
        // the manager) when the socket drops.
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let event: SidecarEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "unparseable sidecar frame");
                        continue;
                    },
                };
                if let SidecarEvent::SendResult { success, ref error } = event {
                    if !success {
                        warn!(?error, "sidecar failed to deliver a message");
                    }
                    continue;
                }
                let Some(event) = event.into_transport_event() else {
                    continue;
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            // Socket gone without a close frame: surface as a retriable drop.
            let _ = events
                .send(TransportEvent::Close {
                    reason: CloseReason::Other,
                    detail: "sidecar websocket disconnected".into(),
                })
                .await;
        });

        Ok(Box::new(SidecarHandle { sink }))
    }
}

struct SidecarHandle {
    sink: Arc<Mutex<WsSink>>,
}

#[async_trait]
impl TransportHandle for SidecarHandle {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        send_command(
            &self.sink,
            &GatewayCommand::Send {
                to: to.to_string(),
                text: text.to_string(),
            },
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.close().await.context("failed to close sidecar websocket")
    }
}

async fn send_command(sink: &Arc<Mutex<WsSink>>, command: &GatewayCommand) -> Result<()> {
    let json = serde_json::to_string(command)?;
    let mut sink = sink.lock().await;
    sink.send(Message::text(json))
        .await
        .context("failed to send command to sidecar")
}
