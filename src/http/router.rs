//! Per-request dispatch.
//!
//! ```text
//! RECEIVED → MATCHED → FILTERING_REQUEST → FORWARDED → FILTERING_RESPONSE → COMPLETED
//!     ↘ NO_MATCH (404)                        ↘ UPSTREAM_ERROR (502)
//! ```
//!
//! A request-phase filter that answers itself skips straight to COMPLETED.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{body::Body, http::Request, response::Response};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::forward::{build_client, Forward, UpstreamClient};
use crate::http::request::RequestIdExt;
use crate::http::response;
use crate::observability::metrics;
use crate::resilience::{RetryPolicy, UpstreamTimeouts};
use crate::routing::{RequestContext, SharedRouteTable};

/// Where a request is in its lifecycle. Logged at trace level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Matched,
    NoMatch,
    FilteringRequest,
    Forwarded,
    UpstreamError,
    FilteringResponse,
    Completed,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::Matched => "matched",
            RequestState::NoMatch => "no_match",
            RequestState::FilteringRequest => "filtering_request",
            RequestState::Forwarded => "forwarded",
            RequestState::UpstreamError => "upstream_error",
            RequestState::FilteringResponse => "filtering_response",
            RequestState::Completed => "completed",
        }
    }
}

/// Matches requests against the live route table and drives the chosen
/// route's filter chain into the upstream.
pub struct GatewayRouter {
    routes: Arc<SharedRouteTable>,
    client: UpstreamClient,
    timeouts: UpstreamTimeouts,
    retries: RetryPolicy,
}

impl GatewayRouter {
    pub fn new(routes: Arc<SharedRouteTable>, config: &GatewayConfig) -> Self {
        let timeouts = UpstreamTimeouts::new(&config.timeouts);
        Self {
            routes,
            client: build_client(&timeouts),
            timeouts,
            retries: RetryPolicy::new(&config.retries),
        }
    }

    /// The live route table.
    pub fn routes(&self) -> &Arc<SharedRouteTable> {
        &self.routes
    }

    /// Handle one inbound request end to end. Never fails: every outcome is a
    /// response.
    pub async fn dispatch(&self, req: Request<Body>, client_addr: Option<SocketAddr>) -> Response {
        let start = Instant::now();
        let request_id = req.request_id().to_string();
        let method = req.method().to_string();
        let ctx = RequestContext::from_request(&req, client_addr);
        trace_state(&request_id, RequestState::Received);

        // One snapshot for the whole request, even if the table is replaced meanwhile
        let table = self.routes.load();
        let Some(route) = table.match_request(&ctx) else {
            trace_state(&request_id, RequestState::NoMatch);
            tracing::debug!(
                request_id = %request_id,
                host = %ctx.host(),
                path = %ctx.path(),
                "No route matched"
            );
            metrics::record_request(&method, 404, "none", start);
            return response::from_error(GatewayError::NoRouteMatched);
        };

        trace_state(&request_id, RequestState::Matched);
        tracing::debug!(
            request_id = %request_id,
            route_id = %route.id(),
            upstream = %route.target(),
            "Route matched"
        );

        trace_state(&request_id, RequestState::FilteringRequest);
        let forward = Forward::new(&self.client, &route, self.timeouts, &self.retries, &request_id);
        let response = route.filters().run(req, &forward).await;

        if !forward.was_called() {
            tracing::debug!(
                request_id = %request_id,
                route_id = %route.id(),
                status = response.status().as_u16(),
                "Request answered by filter"
            );
        }
        trace_state(&request_id, RequestState::Completed);
        metrics::record_request(&method, response.status().as_u16(), route.id(), start);
        response
    }
}

pub(crate) fn trace_state(request_id: &str, state: RequestState) {
    tracing::trace!(request_id = %request_id, state = state.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::add_response_header;
    use crate::routing::{predicate::always, Route, RouteTable};
    use axum::http::StatusCode;

    fn router(routes: Vec<Route>) -> GatewayRouter {
        let table = Arc::new(SharedRouteTable::new(RouteTable::new(routes)));
        GatewayRouter::new(table, &GatewayConfig::default())
    }

    #[tokio::test]
    async fn empty_table_is_404() {
        let router = router(Vec::new());
        let response = router.dispatch(Request::new(Body::empty()), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn short_circuit_never_reaches_upstream() {
        let route = Route::builder("teapot")
            // Nothing listens here; reaching it would be a 502
            .uri("http://127.0.0.1:1")
            .predicate(always())
            .filter(crate::filter::request_rate_limiter(1, 1).unwrap())
            .filter(add_response_header("X-Seen", "yes").unwrap())
            .build()
            .unwrap();
        let router = router(vec![route]);

        // The bucket holds one token: the first call spends it on the upstream,
        // the second is answered by the limiter.
        let first = router.dispatch(Request::new(Body::empty()), None).await;
        assert_eq!(first.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(first.headers()["x-seen"], "yes");

        let second = router.dispatch(Request::new(Body::empty()), None).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().get("x-seen").is_none());
    }

    #[test]
    fn state_labels() {
        assert_eq!(RequestState::FilteringResponse.as_str(), "filtering_response");
        assert_eq!(RequestState::NoMatch.as_str(), "no_match");
    }
}
