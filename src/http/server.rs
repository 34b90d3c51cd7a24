//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all proxy handler
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Serve on a listener until shutdown
//! - Hand out the live route table for in-process replacement

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
use crate::http::router::GatewayRouter;
use crate::observability::metrics;
use crate::routing::{Route, RouteTable, SharedRouteTable};

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<GatewayRouter>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    app: Router,
    routes: Arc<SharedRouteTable>,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Build a server whose routes come from `config.routes` and
    /// `config.shorthand_routes`.
    pub fn new(config: GatewayConfig) -> Self {
        let table = RouteTable::from_gateway_config(&config);
        Self::with_table(config, table)
    }

    /// Build a server around routes constructed in code.
    pub fn with_routes(config: GatewayConfig, routes: Vec<Route>) -> Self {
        Self::with_table(config, RouteTable::new(routes))
    }

    fn with_table(config: GatewayConfig, table: RouteTable) -> Self {
        tracing::info!(routes = table.len(), "Route table built");
        metrics::set_route_table_size(table.len());

        let routes = Arc::new(SharedRouteTable::new(table));
        let state = AppState {
            router: Arc::new(GatewayRouter::new(routes.clone(), &config)),
        };
        let app = Self::build_router(&config, state);

        Self {
            app,
            routes,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                request_id = %req.request_id(),
                method = %req.method(),
                path = %req.uri().path(),
            )
        });

        Router::new().fallback(proxy_handler).with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), UuidRequestId))
                .layer(trace)
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// The live route table. `replace` on it takes effect for the next request.
    pub fn routes(&self) -> Arc<SharedRouteTable> {
        self.routes.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    state.router.dispatch(request, Some(addr)).await
}
