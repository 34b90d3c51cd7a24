//! Route lookup.
//!
//! # Responsibilities
//! - Hold the ordered route set
//! - Return the first route whose predicate holds, or no match
//! - Publish replacements atomically to in-flight lookups
//!
//! # Design Decisions
//! - A `RouteTable` is immutable; replacing routes builds a new table
//! - `SharedRouteTable` swaps whole tables, so a lookup sees either the old
//!   set or the new one, never a mix
//! - Stable sort by `order`, ties keep declaration order
//! - O(n) predicate scan, first match wins
//! - Explicit no-match rather than a silent default route

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::{FilterConfig, GatewayConfig, RouteConfig};
use crate::error::ConfigurationError;
use crate::routing::context::RequestContext;
use crate::routing::definition::{build_route, parse_shorthand};
use crate::routing::route::Route;

/// An immutable, ordered set of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    /// Build a table. Later routes reusing an id are dropped.
    pub fn new(routes: Vec<Route>) -> Self {
        let mut seen = HashSet::new();
        let mut routes: Vec<Arc<Route>> = routes
            .into_iter()
            .filter(|route| {
                let fresh = seen.insert(route.id().to_string());
                if !fresh {
                    let error = ConfigurationError::DuplicateRouteId(route.id().to_string());
                    tracing::warn!(error = %error, "Skipping route, keeping the first with this id");
                }
                fresh
            })
            .map(Arc::new)
            .collect();
        routes.sort_by_key(|route| route.order());
        Self { routes }
    }

    /// Build a table from definitions. Broken definitions are logged and skipped.
    pub fn from_config(routes: &[RouteConfig], default_filters: &[FilterConfig]) -> Self {
        let built = routes
            .iter()
            .filter_map(|config| match build_route(config, default_filters) {
                Ok(route) => Some(route),
                Err(e) => {
                    tracing::warn!(route_id = %config.id, error = %e, "Skipping route");
                    None
                }
            })
            .collect();
        Self::new(built)
    }

    /// Build a table from `routes` followed by `shorthand_routes`.
    pub fn from_gateway_config(config: &GatewayConfig) -> Self {
        let mut definitions = config.routes.clone();
        for text in &config.shorthand_routes {
            match parse_shorthand(text) {
                Ok(definition) => definitions.push(definition),
                Err(e) => tracing::warn!(error = %e, "Skipping route"),
            }
        }
        Self::from_config(&definitions, &config.default_filters)
    }

    /// First route whose predicate holds for `ctx`.
    pub fn match_request(&self, ctx: &RequestContext) -> Option<Arc<Route>> {
        self.routes.iter().find(|route| route.matches(ctx)).cloned()
    }

    /// A new table holding `routes`. `self` is untouched.
    pub fn replace(&self, routes: Vec<Route>) -> RouteTable {
        RouteTable::new(routes)
    }

    /// Routes in evaluation order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|route| route.id() == id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// The live route table, replaceable while requests are in flight.
#[derive(Debug)]
pub struct SharedRouteTable {
    inner: ArcSwap<RouteTable>,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            inner: ArcSwap::from_pointee(table),
        }
    }

    /// Snapshot of the current table.
    pub fn load(&self) -> Arc<RouteTable> {
        self.inner.load_full()
    }

    /// Publish `table`, returning the previous one.
    pub fn store(&self, table: RouteTable) -> Arc<RouteTable> {
        self.publish(Arc::new(table))
    }

    /// Replace every route with `routes`, returning the table now in effect.
    pub fn replace(&self, routes: Vec<Route>) -> Arc<RouteTable> {
        let table = Arc::new(self.load().replace(routes));
        self.publish(table.clone());
        table
    }

    fn publish(&self, table: Arc<RouteTable>) -> Arc<RouteTable> {
        let size = table.len();
        let previous = self.inner.swap(table);
        tracing::info!(routes = size, "Route table replaced");
        crate::observability::metrics::set_route_table_size(size);
        previous
    }
}

impl Default for SharedRouteTable {
    fn default() -> Self {
        Self::new(RouteTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::predicate::{always, host, path};
    use axum::{body::Body, http::Request};

    fn route(id: &str, order: i32, pattern: &str) -> Route {
        Route::builder(id)
            .uri("http://127.0.0.1:9000")
            .order(order)
            .predicate(path(pattern).unwrap())
            .build()
            .unwrap()
    }

    fn ctx(host: &str, uri: &str) -> RequestContext {
        let req = Request::builder()
            .uri(uri)
            .header("Host", host)
            .body(Body::empty())
            .unwrap();
        RequestContext::from_request(&req, None)
    }

    #[test]
    fn first_match_wins_in_declaration_order() {
        let table = RouteTable::new(vec![
            route("first", 0, "/image/png"),
            route("second", 0, "/image/png"),
        ]);

        for _ in 0..10 {
            let matched = table.match_request(&ctx("any.org", "/image/png")).unwrap();
            assert_eq!(matched.id(), "first");
        }
    }

    #[test]
    fn order_sorts_before_declaration() {
        let table = RouteTable::new(vec![
            route("catch-all", 10, "/**"),
            route("images", 0, "/image/**"),
            route("late", 10, "/image/png"),
        ]);

        let ids: Vec<_> = table.routes().iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["images", "catch-all", "late"]);
        assert_eq!(table.match_request(&ctx("a", "/image/png")).unwrap().id(), "images");
        assert_eq!(table.match_request(&ctx("a", "/other")).unwrap().id(), "catch-all");
    }

    #[test]
    fn no_match_is_none() {
        let table = RouteTable::new(vec![Route::builder("kotlin")
            .uri("http://127.0.0.1:9000")
            .predicate(host("kotlin.abc.org").unwrap())
            .build()
            .unwrap()]);

        assert!(table.match_request(&ctx("java.abc.org", "/")).is_none());
        assert!(RouteTable::default().match_request(&ctx("a", "/")).is_none());
    }

    #[test]
    fn duplicate_ids_keep_the_first() {
        let table = RouteTable::new(vec![route("dup", 0, "/a"), route("dup", 0, "/b")]);
        assert_eq!(table.len(), 1);
        assert!(table.get("dup").unwrap().matches(&ctx("h", "/a")));
        assert!(!table.get("dup").unwrap().matches(&ctx("h", "/b")));
    }

    #[test]
    fn broken_definitions_are_skipped() {
        let mut config = GatewayConfig::default();
        config.shorthand_routes = vec![
            "good=http://127.0.0.1:9000,Path=/ok".into(),
            "bad=ftp://127.0.0.1,Path=/".into(),
            "garbage".into(),
        ];
        let table = RouteTable::from_gateway_config(&config);

        assert_eq!(table.len(), 1);
        assert!(table.get("good").is_some());
        assert!(table.get("bad").is_none());
    }

    #[test]
    fn replace_swaps_whole_table() {
        let shared = SharedRouteTable::new(RouteTable::new(vec![route("old", 0, "/**")]));
        let before = shared.load();

        let current = shared.replace(vec![Route::builder("new")
            .uri("http://127.0.0.1:9001")
            .predicate(always())
            .build()
            .unwrap()]);

        assert_eq!(current.routes()[0].id(), "new");
        assert_eq!(before.routes()[0].id(), "old");
        // A snapshot taken before the swap keeps answering from the old set
        assert_eq!(before.match_request(&ctx("h", "/x")).unwrap().id(), "old");
        assert_eq!(shared.load().match_request(&ctx("h", "/x")).unwrap().id(), "new");
    }

    #[tokio::test]
    async fn concurrent_lookups_see_a_consistent_table() {
        let shared = Arc::new(SharedRouteTable::new(RouteTable::new(vec![
            route("a1", 0, "/**"),
            route("a2", 1, "/**"),
        ])));

        let reader = {
            let shared = shared.clone();
            tokio::spawn(async move {
                for _ in 0..1_000 {
                    let table = shared.load();
                    let ids: Vec<_> = table.routes().iter().map(|r| r.id().to_string()).collect();
                    assert!(
                        ids == ["a1", "a2"] || ids == ["b1", "b2"],
                        "mixed table: {ids:?}"
                    );
                    tokio::task::yield_now().await;
                }
            })
        };

        for i in 0..100 {
            let prefix = if i % 2 == 0 { "b" } else { "a" };
            shared.replace(vec![
                route(&format!("{prefix}1"), 0, "/**"),
                route(&format!("{prefix}2"), 1, "/**"),
            ]);
            tokio::task::yield_now().await;
        }

        reader.await.unwrap();
    }
}
