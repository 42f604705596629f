//! Router assembly and server startup.

use std::{future::Future, sync::Arc};

use {
    anyhow::{Context, Result},
    axum::{Json, Router, response::IntoResponse, routing::get},
    courier_dispatch::Dispatcher,
    courier_routing::RouteStore,
    courier_whatsapp::ConnectionManager,
    tower_http::cors::{Any, CorsLayer},
    tracing::info,
};

use crate::{route_api, whatsapp_api};

/// Shared handler state. Cheap to clone; everything inside is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<dyn RouteStore>,
    pub dispatcher: Arc<Dispatcher>,
    /// Present only when the direct-connection provider is active.
    pub manager: Option<Arc<ConnectionManager>>,
}

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .merge(route_api::router())
        .merge(whatsapp_api::router())
        .layer(cors)
        .with_state(state)
}

/// Serve the app until the shutdown future resolves.
pub async fn serve(
    app: Router,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server error")
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}
