//! Route management CRUD.

use {
    axum::{
        Json, Router,
        extract::{Path, State},
        response::IntoResponse,
        routing::get,
    },
    courier_common::Environment,
    courier_routing::Route,
    serde::Deserialize,
    tracing::info,
};

use crate::{
    envelope::{ApiError, created, ok, ok_with_message},
    server::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/routes", get(list_routes).post(create_route))
        .route(
            "/api/routes/{channel_id}",
            get(get_route).put(update_route).delete(delete_route),
        )
}

/// Body accepted by create and update. Everything but the endpoint is
/// optional so clients can send sparse documents.
#[derive(Deserialize)]
pub struct RouteBody {
    #[serde(default)]
    pub channel_id: Option<String>,
    pub agent_endpoint: String,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub regex_filter: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

impl RouteBody {
    fn into_route(self, channel_id: String) -> Route {
        Route {
            channel_id,
            agent_endpoint: self.agent_endpoint,
            environment: self.environment.unwrap_or_default(),
            regex_filter: self.regex_filter,
            config: self.config,
        }
    }
}

/// A filter pattern must compile before it is stored; a route that can
/// never match is a misconfiguration, not a runtime condition.
fn check_filter(pattern: Option<&str>) -> Result<(), ApiError> {
    if let Some(pattern) = pattern
        && let Err(e) = regex::Regex::new(pattern)
    {
        return Err(ApiError::bad_request(
            format!("invalid regex filter: {pattern}"),
            "INVALID_REGEX_PATTERN",
            e.to_string(),
        ));
    }
    Ok(())
}

async fn list_routes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let routes = state
        .routes
        .list()
        .await
        .map_err(|e| ApiError::internal(format!("failed to list routes: {e}")))?;
    Ok(ok(routes))
}

async fn get_route(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let route = state
        .routes
        .get(&channel_id)
        .await
        .map_err(|e| ApiError::internal(format!("failed to load route: {e}")))?
        .ok_or_else(|| {
            ApiError::not_found(format!("no route for channel {channel_id}"), "ROUTE_NOT_FOUND")
        })?;
    Ok(ok(route))
}

async fn create_route(
    State(state): State<AppState>,
    Json(body): Json<RouteBody>,
) -> Result<impl IntoResponse, ApiError> {
    check_filter(body.regex_filter.as_deref())?;
    let Some(channel_id) = body.channel_id.clone().filter(|c| !c.is_empty()) else {
        return Err(ApiError::bad_request(
            "channel_id is required",
            "MISSING_CHANNEL_ID",
            "provide a channel_id or \"*\" for the wildcard route",
        ));
    };

    let route = body.into_route(channel_id.clone());
    state
        .routes
        .upsert(route.clone())
        .await
        .map_err(|e| ApiError::internal(format!("failed to store route: {e}")))?;
    info!(channel_id = %channel_id, endpoint = %route.agent_endpoint, "route created");
    Ok(created(route, "Route created"))
}

/// Upserts on miss. When the body carries a different `channel_id` than the
/// path, the route moves: the old key is deleted and the new one written.
async fn update_route(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Json(body): Json<RouteBody>,
) -> Result<impl IntoResponse, ApiError> {
    check_filter(body.regex_filter.as_deref())?;

    let target = body
        .channel_id
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| channel_id.clone());
    let route = body.into_route(target.clone());

    if target != channel_id {
        state
            .routes
            .delete(&channel_id)
            .await
            .map_err(|e| ApiError::internal(format!("failed to move route: {e}")))?;
    }
    state
        .routes
        .upsert(route.clone())
        .await
        .map_err(|e| ApiError::internal(format!("failed to store route: {e}")))?;
    info!(from = %channel_id, to = %target, "route updated");
    Ok(ok_with_message(route, "Route updated"))
}

async fn delete_route(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .routes
        .delete(&channel_id)
        .await
        .map_err(|e| ApiError::internal(format!("failed to delete route: {e}")))?;
    if !removed {
        return Err(ApiError::not_found(
            format!("no route for channel {channel_id}"),
            "ROUTE_NOT_FOUND",
        ));
    }
    info!(channel_id = %channel_id, "route deleted");
    Ok(ok_with_message(serde_json::json!({ "channel_id": channel_id }), "Route deleted"))
}
