//! In-memory route store.
//!
//! Used by tests and as the fallback when no database path is configured —
//! routes then live only as long as the process.

use std::collections::BTreeMap;

use {
    anyhow::Result,
    async_trait::async_trait,
    courier_routing::{Route, RouteStore},
    tokio::sync::RwLock,
};

/// `BTreeMap` keeps listings ordered by channel id without a sort.
pub struct MemoryRouteStore {
    routes: RwLock<BTreeMap<String, Route>>,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryRouteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn get(&self, channel_id: &str) -> Result<Option<Route>> {
        Ok(self.routes.read().await.get(channel_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Route>> {
        Ok(self.routes.read().await.values().cloned().collect())
    }

    async fn upsert(&self, route: Route) -> Result<()> {
        self.routes
            .write()
            .await
            .insert(route.channel_id.clone(), route);
        Ok(())
    }

    async fn delete(&self, channel_id: &str) -> Result<bool> {
        Ok(self.routes.write().await.remove(channel_id).is_some())
    }
}
