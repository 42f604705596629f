//! Baileys sidecar process supervision.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use {
    anyhow::{Context, Result, bail},
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

use crate::sidecar::DEFAULT_SIDECAR_PORT;

/// Handle to a running sidecar process.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Gracefully stop the sidecar.
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping whatsapp sidecar process");

        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{Signal, kill},
                unistd::Pid,
            };

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill().await;
        }

        match tokio::time::timeout(std::time::Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "sidecar process exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for sidecar process"),
            Err(_) => {
                warn!("sidecar did not exit gracefully, killing");
                let _ = self.child.kill().await;
            },
        }
        Ok(())
    }
}

/// Configuration for spawning the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarProcessConfig {
    /// Directory containing the sidecar's `package.json`.
    pub dir: PathBuf,
    /// Port the sidecar's control WebSocket listens on.
    pub port: u16,
    /// Auth state directory handed through to Baileys.
    pub auth_dir: Option<PathBuf>,
}

impl Default for SidecarProcessConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::new(),
            port: DEFAULT_SIDECAR_PORT,
            auth_dir: None,
        }
    }
}

/// Find the sidecar directory: explicit path, `COURIER_SIDECAR_DIR`, or
/// `sidecar/` relative to the executable and the working directory.
pub fn find_sidecar_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.join("package.json").exists() {
            return Ok(path.to_path_buf());
        }
        bail!("sidecar directory missing package.json: {}", path.display());
    }

    if let Ok(dir) = std::env::var("COURIER_SIDECAR_DIR") {
        let path = PathBuf::from(&dir);
        if path.join("package.json").exists() {
            return Ok(path);
        }
        warn!(path = %dir, "COURIER_SIDECAR_DIR set but package.json not found");
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        for rel in ["../sidecar", "../../sidecar"] {
            let candidate = exe_dir.join(rel);
            if candidate.join("package.json").exists() {
                return Ok(candidate);
            }
        }
    }

    for rel in ["sidecar", "../sidecar"] {
        let path = PathBuf::from(rel);
        if path.join("package.json").exists() {
            return Ok(path.canonicalize().unwrap_or(path));
        }
    }

    bail!("whatsapp sidecar not found; set COURIER_SIDECAR_DIR or create ./sidecar")
}

/// Spawn the sidecar and forward its output to tracing.
pub async fn start_sidecar(config: SidecarProcessConfig) -> Result<SidecarProcess> {
    let dir = &config.dir;
    if !dir.join("package.json").exists() {
        bail!(
            "whatsapp sidecar not found at {}; run `npm install` there first",
            dir.display()
        );
    }
    if !dir.join("node_modules").exists() {
        run_npm_install(dir).await?;
    }

    info!(path = %dir.display(), port = config.port, "starting whatsapp sidecar");

    let mut cmd = Command::new("node");
    cmd.arg("index.js")
        .current_dir(dir)
        .env("COURIER_SIDECAR_PORT", config.port.to_string())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(auth_dir) = &config.auth_dir {
        cmd.env("COURIER_AUTH_DIR", auth_dir);
    }

    let mut child = cmd.spawn().context("failed to spawn sidecar process")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                // The sidecar logs JSON (pino); map its levels onto ours.
                if line.starts_with('{')
                    && let Ok(log) = serde_json::from_str::<serde_json::Value>(&line)
                {
                    let level = log.get("level").and_then(|v| v.as_u64()).unwrap_or(30);
                    let msg = log.get("msg").and_then(|v| v.as_str()).unwrap_or(&line);
                    match level {
                        10 | 20 => debug!(target: "wa_sidecar", "{}", msg),
                        30 => info!(target: "wa_sidecar", "{}", msg),
                        40 => warn!(target: "wa_sidecar", "{}", msg),
                        _ => error!(target: "wa_sidecar", "{}", msg),
                    }
                    continue;
                }
                info!(target: "wa_sidecar", "{}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "wa_sidecar", "{}", line);
            }
        });
    }

    // Give the process a beat to fail fast on startup errors.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    match child.try_wait() {
        Ok(Some(status)) => bail!("sidecar exited immediately with status {status}"),
        Ok(None) => {},
        Err(e) => bail!("failed to check sidecar status: {e}"),
    }

    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

async fn run_npm_install(dir: &Path) -> Result<()> {
    info!(path = %dir.display(), "running npm install for sidecar");
    let output = Command::new("npm")
        .arg("install")
        .current_dir(dir)
        .output()
        .await
        .context("failed to run npm install")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("npm install failed: {stderr}");
    }
    Ok(())
}
