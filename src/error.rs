//! Error taxonomy.
//!
//! Two families with different lifetimes:
//! - [`ConfigurationError`] surfaces while routes are built. It is scoped to a
//!   single route: the route is logged and left out of the table.
//! - [`GatewayError`] surfaces while a request is handled. Every variant maps
//!   to a well-formed HTTP response, so nothing reaches the client as a fault.

use std::time::Duration;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// A defect found while constructing a predicate, filter or route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("invalid host pattern {pattern:?}: {reason}")]
    HostPattern { pattern: String, reason: String },

    #[error("invalid path pattern {pattern:?}: {reason}")]
    PathPattern { pattern: String, reason: String },

    #[error("invalid method {0:?}")]
    Method(String),

    #[error("invalid header name {0:?}")]
    HeaderName(String),

    #[error("invalid header value for {0:?}")]
    HeaderValue(String),

    #[error("invalid date-time {value:?}: {reason}")]
    DateTime { value: String, reason: String },

    #[error("invalid address range {0:?}")]
    AddressRange(String),

    #[error("invalid upstream uri {uri:?}: {reason}")]
    TargetUri { uri: String, reason: String },

    #[error("invalid filter {filter}: {reason}")]
    Filter { filter: &'static str, reason: String },

    #[error("route {0:?} has no predicate")]
    MissingPredicate(String),

    #[error("route id must not be empty")]
    EmptyRouteId,

    #[error("duplicate route id {0:?}")]
    DuplicateRouteId(String),

    #[error("cannot parse route definition {text:?}: {reason}")]
    Shorthand { text: String, reason: String },
}

/// Result type for route construction.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Failures that terminate a request inside the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No route predicate accepted the request. Expected, not logged as an error.
    #[error("no route matched")]
    NoRouteMatched,

    /// Connecting to or exchanging with the upstream failed.
    #[error("upstream {upstream} unreachable: {reason}")]
    UpstreamUnreachable { upstream: String, reason: String },

    /// The upstream did not answer within the configured bound.
    #[error("upstream {upstream} timed out after {timeout:?}")]
    UpstreamTimeout { upstream: String, timeout: Duration },

    /// The forwarded request could not be assembled.
    #[error("cannot build upstream request: {0}")]
    InvalidUpstreamRequest(String),
}

impl GatewayError {
    /// Status code sent to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoRouteMatched => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnreachable { .. }
            | GatewayError::UpstreamTimeout { .. }
            | GatewayError::InvalidUpstreamRequest(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NoRouteMatched => "no_route",
            GatewayError::UpstreamUnreachable { .. } => "unreachable",
            GatewayError::UpstreamTimeout { .. } => "timeout",
            GatewayError::InvalidUpstreamRequest(_) => "invalid_request",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = match &self {
            GatewayError::NoRouteMatched => "No matching route found",
            GatewayError::UpstreamTimeout { .. } => "Upstream request timed out",
            _ => "Upstream request failed",
        };
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status();
        response
    }
}
