mod route_commands;

use std::sync::Arc;

use {
    anyhow::Result,
    clap::{Parser, Subcommand},
    courier_channels::{MessageFilter, WebhookChannel},
    courier_config::{GatewayConfig, ProviderKind},
    courier_dispatch::{Dispatcher, Provider, spawn_inbound_pump},
    courier_gateway::{AppState, build_app, serve},
    courier_routing::{RouteStore, RoutingEngine},
    courier_storage::{MemoryRouteStore, SqliteRouteStore},
    courier_whatsapp::{
        ConnectionManager, ManagerConfig, SidecarTransport, render_qr_terminal,
    },
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "courier", about = "Courier — WhatsApp to AI-agent gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Port to listen on (overrides COURIER_PORT).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Message provider (overrides COURIER_PROVIDER): baileys or webhook.
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Serve,
    /// Route management without going through the HTTP API.
    Routes {
        #[command(subcommand)]
        action: route_commands::RouteAction,
    },
    /// Render a QR payload as terminal glyphs.
    Qr {
        /// The raw QR payload to render.
        #[arg(long)]
        data: String,
    },
}

fn init_telemetry(cli: &Cli, debug: bool) {
    let default_filter = if debug && cli.log_level == "info" {
        "debug"
    } else {
        cli.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }
}

async fn build_store(config: &GatewayConfig) -> Result<Arc<dyn RouteStore>> {
    match &config.database {
        Some(path) => {
            let url = if path.starts_with("sqlite:") {
                path.clone()
            } else {
                format!("sqlite://{path}?mode=rwc")
            };
            info!(database = %url, "using sqlite route store");
            Ok(Arc::new(SqliteRouteStore::new(&url).await?))
        },
        None => {
            info!("no database configured, routes held in memory");
            Ok(Arc::new(MemoryRouteStore::new()))
        },
    }
}

async fn run_serve(cli: Cli) -> Result<()> {
    let mut config = GatewayConfig::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(provider) = cli.provider {
        config.provider = provider;
    }

    let store = build_store(&config).await?;
    let engine = RoutingEngine::new(store.clone());

    let mut manager: Option<Arc<ConnectionManager>> = None;
    let mut transport: Option<Arc<SidecarTransport>> = None;
    let provider = match config.provider {
        ProviderKind::Baileys => {
            let mut sidecar = SidecarTransport::new(config.sidecar_port);
            if let Some(dir) = &config.sidecar_dir {
                sidecar = sidecar.with_sidecar_dir(dir.clone());
            }
            let sidecar = Arc::new(sidecar);
            transport = Some(sidecar.clone());

            let filter = MessageFilter {
                ignore_groups: config.ignore_groups,
                denylist: config.denylist.clone(),
                ..MessageFilter::default()
            };
            let m = ConnectionManager::new(
                sidecar,
                ManagerConfig {
                    auth_dir: config.auth_dir.clone(),
                    filter,
                    ..ManagerConfig::default()
                },
            );
            manager = Some(m.clone());
            Provider::Baileys(m)
        },
        ProviderKind::Webhook => {
            let api_url = config.webhook_api_url.clone().unwrap_or_default();
            let api_key = config.webhook_api_key.clone().unwrap_or_default();
            if api_url.is_empty() {
                warn!("COURIER_WEBHOOK_API_URL is not set, outbound sends will fail");
            }
            Provider::Webhook(WebhookChannel::new(api_url, api_key))
        },
    };

    let dispatcher = Arc::new(Dispatcher::new(engine, config.agent.clone(), Some(provider)));

    let mut pump = None;
    if let Some(manager) = &manager {
        if let Some(inbound) = manager.take_inbound() {
            pump = Some(spawn_inbound_pump(dispatcher.clone(), inbound));
        }
        if let Err(e) = manager.connect().await {
            // The gateway stays up so the status and QR endpoints can report
            // what went wrong; operators reconnect via a restart.
            warn!(error = %e, "initial connect failed");
        }
    }

    let app = build_app(AppState {
        routes: store,
        dispatcher,
        manager: manager.clone(),
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        "courier starting"
    );
    serve(app, config.port, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await?;

    // Orderly teardown: stop reconnecting, close the socket, stop the sidecar.
    if let Some(manager) = &manager {
        if let Err(e) = manager.disconnect().await {
            warn!(error = %e, "disconnect failed during shutdown");
        }
    }
    if let Some(transport) = &transport
        && let Err(e) = transport.stop_process().await
    {
        warn!(error = %e, "sidecar stop failed during shutdown");
    }
    if let Some(pump) = pump {
        pump.abort();
    }
    info!("courier stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let mut cli = Cli::parse();
    let config = GatewayConfig::from_env();
    init_telemetry(&cli, config.debug);

    match cli.command.take() {
        None | Some(Commands::Serve) => run_serve(cli).await,
        Some(Commands::Routes { action }) => {
            let store = build_store(&config).await?;
            route_commands::handle_routes(store, action).await
        },
        Some(Commands::Qr { data }) => {
            println!("{}", render_qr_terminal(&data)?);
            Ok(())
        },
    }
}
