//! `courier routes` subcommands: operate on the store directly, without
//! the HTTP API.

use std::sync::Arc;

use {
    anyhow::{Context, Result, bail},
    clap::Subcommand,
    courier_common::Environment,
    courier_routing::{Route, RouteStore},
};

#[derive(Subcommand)]
pub enum RouteAction {
    /// List all configured routes.
    List,
    /// Add or replace a route.
    Add {
        /// Channel to route, or "*" for the wildcard route.
        channel_id: String,
        /// Base URL of the agent backend.
        agent_endpoint: String,
        /// lab or prod.
        #[arg(long, default_value = "lab")]
        environment: Environment,
        /// Only route messages whose text matches this regex.
        #[arg(long)]
        filter: Option<String>,
        /// Per-route agent overrides as a JSON object.
        #[arg(long)]
        config: Option<String>,
    },
    /// Remove a route.
    Remove { channel_id: String },
}

pub async fn handle_routes(store: Arc<dyn RouteStore>, action: RouteAction) -> Result<()> {
    match action {
        RouteAction::List => {
            let routes = store.list().await?;
            if routes.is_empty() {
                println!("no routes configured");
                return Ok(());
            }
            for route in routes {
                let filter = route.regex_filter.as_deref().unwrap_or("-");
                println!(
                    "{:<24} {:<40} {:<5} {}",
                    route.channel_id, route.agent_endpoint, route.environment, filter
                );
            }
        },
        RouteAction::Add {
            channel_id,
            agent_endpoint,
            environment,
            filter,
            config,
        } => {
            if let Some(pattern) = &filter {
                regex::Regex::new(pattern)
                    .with_context(|| format!("invalid regex filter: {pattern}"))?;
            }
            let config = match config {
                Some(raw) => Some(
                    serde_json::from_str(&raw).context("config must be a JSON object")?,
                ),
                None => None,
            };
            let route = Route {
                channel_id: channel_id.clone(),
                agent_endpoint,
                environment,
                regex_filter: filter,
                config,
            };
            store.upsert(route).await?;
            println!("route {channel_id} stored");
        },
        RouteAction::Remove { channel_id } => {
            if !store.delete(&channel_id).await? {
                bail!("no route for channel {channel_id}");
            }
            println!("route {channel_id} removed");
        },
    }
    Ok(())
}
