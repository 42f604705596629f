//! Connection status, QR rendering, and the provider webhook intake.

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::{Path, State},
        http::{StatusCode, header},
        response::IntoResponse,
        routing::{get, post},
    },
    courier_whatsapp::{ConnectionStatus, render_qr_png},
    serde::Serialize,
    tracing::{debug, warn},
};

use crate::{envelope::ApiError, server::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/whatsapp/status", get(status_handler))
        .route("/api/whatsapp/qr", get(qr_handler))
        .route("/webhooks/whatsapp/{environment}", post(webhook_handler))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: &'static str,
    connected: bool,
    qr_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let Some(manager) = &state.manager else {
        return Json(StatusResponse {
            status: ConnectionStatus::Disconnected.as_str(),
            connected: false,
            qr_available: false,
            error: None,
        });
    };

    let snapshot = manager.snapshot();
    Json(StatusResponse {
        status: snapshot.status.as_str(),
        connected: snapshot.connected(),
        qr_available: snapshot.qr_code.is_some(),
        error: snapshot.last_error,
    })
}

async fn qr_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let qr_code = state
        .manager
        .as_ref()
        .and_then(|m| m.snapshot().qr_code)
        .ok_or_else(|| ApiError::not_found("no QR code available", "QR_NOT_AVAILABLE"))?;

    let png = render_qr_png(&qr_code)
        .map_err(|e| ApiError::internal(format!("failed to render QR: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// Provider webhook intake. Always acknowledges with 200 so the provider
/// never retries; parsing, normalization, and dispatch run in a detached
/// task. The body is taken raw so a malformed payload cannot turn into a
/// 4xx from the extractor.
async fn webhook_handler(
    State(state): State<AppState>,
    Path(environment): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    debug!(environment = %environment, "webhook payload received");

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let payload: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "webhook body is not JSON, dropping");
                return;
            },
        };
        let Some(message) = dispatcher.normalize_webhook(&payload) else {
            warn!("webhook payload not recognized, dropping");
            return;
        };
        let outcome = dispatcher.route_message(&message).await;
        if !outcome.success {
            debug!(
                channel_id = %message.channel_id,
                error = ?outcome.error,
                "webhook message not dispatched"
            );
        }
    });

    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "received": true })),
    )
}
