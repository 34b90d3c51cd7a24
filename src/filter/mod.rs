//! Filter subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route
//!     → request-phase filters, declared order (may short-circuit)
//!     → Endpoint (forward to upstream)
//!     → response-phase filters, declared order
//!     → Response to client
//! ```
//!
//! # Design Decisions
//! - One contract for every filter: `apply(request, next) -> Response`
//! - `Next` is a continuation over the rest of the chain plus the endpoint
//! - Response-phase filters are stored innermost-first, so the first declared
//!   one sees the upstream response first and the last declared one has the
//!   final word
//! - A filter that returns without calling `next` ends the chain

pub mod headers;
pub mod path;
pub mod rate_limit;

use std::fmt;
use std::sync::Arc;

use axum::{body::Body, http::Request, response::Response};
use futures_util::future::BoxFuture;

pub use headers::{
    add_request_header, add_response_header, remove_hop_by_hop_headers, remove_request_header,
    remove_response_header,
};
pub use path::{prefix_path, set_status};
pub use rate_limit::request_rate_limiter;

/// When a filter does its work relative to the upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPhase {
    /// Inspects or rewrites the request, may answer directly.
    Request,
    /// Calls `next` and rewrites the response it gets back.
    Response,
}

/// A transform around the proxy hop.
pub trait Filter: Send + Sync + fmt::Debug {
    fn phase(&self) -> FilterPhase;

    fn apply<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// Shared handle to a filter.
pub type SharedFilter = Arc<dyn Filter>;

/// Terminal step of a chain.
pub trait Endpoint: Send + Sync {
    fn call(&self, req: Request<Body>) -> BoxFuture<'_, Response>;
}

/// The remainder of a filter chain.
pub struct Next<'a> {
    filters: &'a [SharedFilter],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Run the remaining filters, then the endpoint.
    pub async fn run(self, req: Request<Body>) -> Response {
        match self.filters.split_first() {
            Some((filter, rest)) => {
                let next = Next {
                    filters: rest,
                    endpoint: self.endpoint,
                };
                filter.apply(req, next).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

/// An ordered, immutable list of filters.
#[derive(Clone, Default)]
pub struct FilterChain {
    declared: Vec<SharedFilter>,
    execution: Vec<SharedFilter>,
}

impl FilterChain {
    pub fn new(filters: Vec<SharedFilter>) -> Self {
        let mut execution: Vec<SharedFilter> = filters
            .iter()
            .filter(|f| f.phase() == FilterPhase::Request)
            .cloned()
            .collect();
        execution.extend(
            filters
                .iter()
                .rev()
                .filter(|f| f.phase() == FilterPhase::Response)
                .cloned(),
        );

        Self {
            declared: filters,
            execution,
        }
    }

    /// Filters in declaration order.
    pub fn filters(&self) -> &[SharedFilter] {
        &self.declared
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// Drive `req` through the chain and into `endpoint`.
    pub async fn run(&self, req: Request<Body>, endpoint: &dyn Endpoint) -> Response {
        Next {
            filters: &self.execution,
            endpoint,
        }
        .run(req)
        .await
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.declared.iter()).finish()
    }
}
