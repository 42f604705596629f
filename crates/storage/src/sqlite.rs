//! SQLite-backed route store using sqlx.

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    courier_common::Environment,
    courier_routing::{Route, RouteStore},
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
    tracing::debug,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS routes (
    channel_id     TEXT PRIMARY KEY,
    agent_endpoint TEXT NOT NULL,
    environment    TEXT NOT NULL DEFAULT 'lab',
    regex_filter   TEXT,
    config         TEXT,
    created_at     INTEGER NOT NULL DEFAULT (unixepoch() * 1000),
    updated_at     INTEGER NOT NULL DEFAULT (unixepoch() * 1000)
);
";

/// Persistent route storage. One row per channel, config stored as JSON text.
pub struct SqliteRouteStore {
    pool: SqlitePool,
}

impl SqliteRouteStore {
    /// Open (or create) the database at `database_url` and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to SQLite")?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("failed to run route store migration")?;
        debug!(database_url, "route store ready");

        Ok(Self { pool })
    }

    /// Use an existing pool. The `routes` table must already exist.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn route_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Route> {
    let environment: String = row.get("environment");
    let config: Option<String> = row.get("config");
    Ok(Route {
        channel_id: row.get("channel_id"),
        agent_endpoint: row.get("agent_endpoint"),
        environment: environment
            .parse::<Environment>()
            .unwrap_or(Environment::Lab),
        regex_filter: row.get("regex_filter"),
        config: config
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("malformed route config JSON")?,
    })
}

#[async_trait]
impl RouteStore for SqliteRouteStore {
    async fn get(&self, channel_id: &str) -> Result<Option<Route>> {
        let row = sqlx::query(
            "SELECT channel_id, agent_endpoint, environment, regex_filter, config
             FROM routes WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(route_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Route>> {
        let rows = sqlx::query(
            "SELECT channel_id, agent_endpoint, environment, regex_filter, config
             FROM routes ORDER BY channel_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(route_from_row).collect()
    }

    async fn upsert(&self, route: Route) -> Result<()> {
        let config = route
            .config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        sqlx::query(
            "INSERT INTO routes (channel_id, agent_endpoint, environment, regex_filter, config)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(channel_id) DO UPDATE SET
                agent_endpoint = excluded.agent_endpoint,
                environment    = excluded.environment,
                regex_filter   = excluded.regex_filter,
                config         = excluded.config,
                updated_at     = unixepoch() * 1000",
        )
        .bind(&route.channel_id)
        .bind(&route.agent_endpoint)
        .bind(route.environment.to_string())
        .bind(&route.regex_filter)
        .bind(config)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, channel_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM routes WHERE channel_id = ?")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
