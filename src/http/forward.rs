//! The proxy hop.
//!
//! # Responsibilities
//! - Rewrite the request URI and `Host` header onto the route's target
//! - Send it through the pooled upstream client under the configured deadlines
//! - Retry idempotent requests with a replayable body, with backoff
//! - Map connect failures and timeouts to `GatewayError` (502)
//!
//! # Design Decisions
//! - Bodies are streamed unless a retry may need to replay them
//! - Dropping the request future drops the upstream call and its connection

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, request::Parts, HeaderValue, Request, Version},
    response::Response,
};
use futures_util::{future::BoxFuture, FutureExt};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::GatewayError;
use crate::filter::Endpoint;
use crate::http::response;
use crate::http::router::{trace_state, RequestState};
use crate::observability::metrics;
use crate::resilience::{is_retryable, RetryPolicy, UpstreamTimeouts};
use crate::routing::Route;

/// Pooled HTTP/1.1 client for upstream calls.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// Build the upstream client with the connect deadline applied.
pub fn build_client(timeouts: &UpstreamTimeouts) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(timeouts.connect));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Forwards one request to one route's target.
///
/// This is the endpoint at the end of the route's filter chain.
pub struct Forward<'a> {
    client: &'a UpstreamClient,
    route: &'a Route,
    timeouts: UpstreamTimeouts,
    retries: &'a RetryPolicy,
    request_id: &'a str,
    called: AtomicBool,
}

impl<'a> Forward<'a> {
    pub fn new(
        client: &'a UpstreamClient,
        route: &'a Route,
        timeouts: UpstreamTimeouts,
        retries: &'a RetryPolicy,
        request_id: &'a str,
    ) -> Self {
        Self {
            client,
            route,
            timeouts,
            retries,
            request_id,
            called: AtomicBool::new(false),
        }
    }

    /// True once the chain reached the upstream, false if a filter answered.
    pub fn was_called(&self) -> bool {
        self.called.load(Ordering::Acquire)
    }

    async fn forward(&self, req: Request<Body>) -> Response {
        let upstream = self.route.target().to_string();
        trace_state(self.request_id, RequestState::Forwarded);

        match self.send(req).await {
            Ok(response) => {
                trace_state(self.request_id, RequestState::FilteringResponse);
                response
            }
            Err(error) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    route_id = %self.route.id(),
                    upstream = %upstream,
                    error = %error,
                    state = RequestState::UpstreamError.as_str(),
                    "Upstream request failed"
                );
                metrics::record_upstream_error(self.route.id(), error.kind());
                response::from_error(error)
            }
        }
    }

    async fn send(&self, req: Request<Body>) -> Result<Response, GatewayError> {
        let (mut parts, body) = req.into_parts();
        let upstream = self.route.target();

        parts.uri = upstream
            .request_uri(&parts.uri)
            .map_err(|e| GatewayError::InvalidUpstreamRequest(e.to_string()))?;
        let host = HeaderValue::from_str(upstream.authority().as_str())
            .map_err(|e| GatewayError::InvalidUpstreamRequest(e.to_string()))?;
        parts.headers.insert(header::HOST, host);
        parts.version = Version::HTTP_11;

        let max_attempts = if self.retries.enabled()
            && replayable(&body, self.retries.max_buffered_body())
        {
            self.retries.attempts_for(&parts.method)
        } else {
            1
        };
        if max_attempts == 1 {
            return self.attempt(Request::from_parts(parts, body)).await;
        }

        let bytes = axum::body::to_bytes(body, self.retries.max_buffered_body())
            .await
            .map_err(|e| GatewayError::InvalidUpstreamRequest(e.to_string()))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let req = rebuild(&parts, bytes.clone());
            let result = self.attempt(req).await;

            if attempt >= max_attempts {
                return result;
            }
            let retry = match &result {
                Ok(response) => is_retryable(&parts.method, Some(response.status()), false),
                Err(_) => is_retryable(&parts.method, None, true),
            };
            if !retry {
                return result;
            }

            let delay = self.retries.backoff(attempt);
            tracing::info!(
                request_id = %self.request_id,
                route_id = %self.route.id(),
                attempt,
                delay = ?delay,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, req: Request<Body>) -> Result<Response, GatewayError> {
        let upstream = self.route.target().to_string();
        match self.timeouts.bound(self.client.request(req)).await {
            Some(Ok(response)) => Ok(response::from_upstream(response)),
            Some(Err(e)) => Err(GatewayError::UpstreamUnreachable {
                upstream,
                reason: error_chain(&e),
            }),
            None => Err(GatewayError::UpstreamTimeout {
                upstream,
                timeout: self.timeouts.upstream,
            }),
        }
    }
}

impl Endpoint for Forward<'_> {
    fn call(&self, req: Request<Body>) -> BoxFuture<'_, Response> {
        self.called.store(true, Ordering::Release);
        self.forward(req).boxed()
    }
}

/// True when the body has a known length no larger than `limit`.
///
/// Streamed bodies of unknown length are never buffered.
fn replayable(body: &Body, limit: usize) -> bool {
    matches!(body.size_hint().exact(), Some(len) if len <= limit as u64)
}

fn rebuild(parts: &Parts, body: Bytes) -> Request<Body> {
    let mut req = Request::new(Body::from(body));
    *req.method_mut() = parts.method.clone();
    *req.uri_mut() = parts.uri.clone();
    *req.version_mut() = parts.version;
    *req.headers_mut() = parts.headers.clone();
    req
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::predicate::always;
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn replayable_bodies() {
        assert!(replayable(&Body::empty(), 1024));
        assert!(replayable(&Body::from("payload"), 1024));
        assert!(!replayable(&Body::from(vec![0u8; 4096]), 1024));
    }

    #[tokio::test]
    async fn closed_port_is_bad_gateway() {
        // Bind then drop to get a port nothing listens on
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let route = Route::builder("dead")
            .uri(format!("http://{addr}"))
            .predicate(always())
            .build()
            .unwrap();
        let timeouts = UpstreamTimeouts {
            connect: Duration::from_millis(500),
            upstream: Duration::from_millis(500),
        };
        let client = build_client(&timeouts);
        let retries = RetryPolicy::default();
        let forward = Forward::new(&client, &route, timeouts, &retries, "test");

        let response = forward.call(Request::new(Body::empty())).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(forward.was_called());
    }
}
