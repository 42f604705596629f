use {anyhow::Result, async_trait::async_trait};

use crate::route::Route;

/// Persistent storage for routing rules.
///
/// Read concurrently by every routing decision; mutated only by the
/// management API. Implementations must provide atomic single-key lookups —
/// no further locking is required by callers.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Look up the route for a channel, if any.
    async fn get(&self, channel_id: &str) -> Result<Option<Route>>;

    /// All routes, ordered by `channel_id` for stable listings.
    async fn list(&self) -> Result<Vec<Route>>;

    /// Insert or replace the route for `route.channel_id`.
    async fn upsert(&self, route: Route) -> Result<()>;

    /// Remove a route. Returns `false` when the channel had none.
    async fn delete(&self, channel_id: &str) -> Result<bool>;
}
