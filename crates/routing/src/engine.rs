//! The routing decision: specific route first, wildcard fallback.

use std::sync::Arc;

use {
    anyhow::Result,
    courier_common::IncomingMessage,
    tracing::{debug, warn},
};

use crate::{
    route::{Route, WILDCARD_CHANNEL},
    store::RouteStore,
};

/// Pure decision logic over a [`RouteStore`].
///
/// Stateless apart from the store handle; calling [`RoutingEngine::route`]
/// twice with the same message and unchanged store yields the same result.
pub struct RoutingEngine {
    store: Arc<dyn RouteStore>,
}

impl RoutingEngine {
    pub fn new(store: Arc<dyn RouteStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RouteStore> {
        &self.store
    }

    /// Find the route that should handle `message`, if any.
    ///
    /// A specific route whose filter rejects the text falls through to the
    /// wildcard exactly as if no specific route existed.
    pub async fn route(&self, message: &IncomingMessage) -> Result<Option<Route>> {
        if let Some(route) = self.store.get(&message.channel_id).await?
            && filter_admits(&route, &message.text)
        {
            debug!(
                channel_id = %message.channel_id,
                endpoint = %route.agent_endpoint,
                "matched specific route"
            );
            return Ok(Some(route));
        }

        if let Some(route) = self.store.get(WILDCARD_CHANNEL).await?
            && filter_admits(&route, &message.text)
        {
            debug!(channel_id = %message.channel_id, "matched wildcard route");
            return Ok(Some(route));
        }

        debug!(channel_id = %message.channel_id, "no route matched");
        Ok(None)
    }
}

/// Evaluate a route's admission filter against the message text.
///
/// No filter admits everything. An unparsable pattern admits nothing: it is
/// logged and treated as a non-match so a broken filter can never wave
/// messages through.
fn filter_admits(route: &Route, text: &str) -> bool {
    let Some(pattern) = route.regex_filter.as_deref() else {
        return true;
    };
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            warn!(
                channel_id = %route.channel_id,
                pattern,
                error = %e,
                "invalid regex filter, treating route as non-matching"
            );
            false
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        async_trait::async_trait,
        chrono::Utc,
        std::{collections::HashMap, sync::Mutex},
    };

    use super::*;

    struct MapStore {
        routes: Mutex<HashMap<String, Route>>,
    }

    impl MapStore {
        fn with(routes: Vec<Route>) -> Arc<Self> {
            Arc::new(Self {
                routes: Mutex::new(
                    routes
                        .into_iter()
                        .map(|r| (r.channel_id.clone(), r))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl RouteStore for MapStore {
        async fn get(&self, channel_id: &str) -> Result<Option<Route>> {
            let routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            Ok(routes.get(channel_id).cloned())
        }

        async fn list(&self) -> Result<Vec<Route>> {
            let routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            Ok(routes.values().cloned().collect())
        }

        async fn upsert(&self, route: Route) -> Result<()> {
            let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            routes.insert(route.channel_id.clone(), route);
            Ok(())
        }

        async fn delete(&self, channel_id: &str) -> Result<bool> {
            let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            Ok(routes.remove(channel_id).is_some())
        }
    }

    fn msg(channel_id: &str, text: &str) -> IncomingMessage {
        IncomingMessage {
            id: "m1".into(),
            from: format!("{channel_id}@s.whatsapp.net"),
            channel_id: channel_id.into(),
            text: text.into(),
            timestamp: Utc::now(),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn specific_route_without_filter_wins_over_wildcard() {
        let store = MapStore::with(vec![
            Route::new("123", "http://specific"),
            Route::new("*", "http://wildcard"),
        ]);
        let engine = RoutingEngine::new(store);

        let route = engine.route(&msg("123", "anything")).await.unwrap();
        assert_eq!(route.unwrap().agent_endpoint, "http://specific");
    }

    #[tokio::test]
    async fn wildcard_matches_when_no_specific_route_exists() {
        let store = MapStore::with(vec![Route::new("*", "http://wildcard")]);
        let engine = RoutingEngine::new(store);

        let route = engine.route(&msg("555", "hello")).await.unwrap();
        assert_eq!(route.unwrap().agent_endpoint, "http://wildcard");
    }

    #[tokio::test]
    async fn filter_mismatch_falls_through_to_wildcard() {
        let mut specific = Route::new("123", "http://specific");
        specific.regex_filter = Some("^Hi".into());
        let store = MapStore::with(vec![specific, Route::new("*", "http://wildcard")]);
        let engine = RoutingEngine::new(store);

        let hi = engine.route(&msg("123", "Hi there")).await.unwrap();
        assert_eq!(hi.unwrap().agent_endpoint, "http://specific");

        let bye = engine.route(&msg("123", "Bye")).await.unwrap();
        assert_eq!(bye.unwrap().agent_endpoint, "http://wildcard");
    }

    #[tokio::test]
    async fn filter_mismatch_without_wildcard_yields_none() {
        let mut specific = Route::new("123", "http://specific");
        specific.regex_filter = Some("^Hi".into());
        let engine = RoutingEngine::new(MapStore::with(vec![specific]));

        let route = engine.route(&msg("123", "Bye")).await.unwrap();
        assert!(route.is_none());
    }

    #[tokio::test]
    async fn invalid_regex_never_matches() {
        let mut broken = Route::new("123", "http://specific");
        broken.regex_filter = Some("[unclosed".into());
        let store = MapStore::with(vec![broken, Route::new("*", "http://wildcard")]);
        let engine = RoutingEngine::new(store);

        let route = engine.route(&msg("123", "anything")).await.unwrap();
        assert_eq!(route.unwrap().agent_endpoint, "http://wildcard");
    }

    #[tokio::test]
    async fn invalid_regex_on_wildcard_fails_closed() {
        let mut broken = Route::new("*", "http://wildcard");
        broken.regex_filter = Some("(".into());
        let engine = RoutingEngine::new(MapStore::with(vec![broken]));

        assert!(engine.route(&msg("9", "x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn routing_is_idempotent() {
        let store = MapStore::with(vec![Route::new("123", "http://specific")]);
        let engine = RoutingEngine::new(store);
        let message = msg("123", "hello");

        let first = engine.route(&message).await.unwrap();
        let second = engine.route(&message).await.unwrap();
        assert_eq!(
            first.map(|r| r.agent_endpoint),
            second.map(|r| r.agent_endpoint)
        );
    }

    #[tokio::test]
    async fn no_routes_yields_none() {
        let engine = RoutingEngine::new(MapStore::with(vec![]));
        assert!(engine.route(&msg("1", "hi")).await.unwrap().is_none());
    }
}
