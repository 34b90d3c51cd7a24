//! Header manipulation filters.
//!
//! # Responsibilities
//! - Add or remove request headers before forwarding
//! - Set or remove response headers after forwarding
//! - Strip hop-by-hop headers from the forwarded request and from the
//!   response returned to the client
//!
//! # Design Decisions
//! - `add_response_header` overwrites every existing value with that name
//! - `add_request_header` appends, leaving client-sent values in place
//! - Names and values are validated when the filter is built

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    response::Response,
};
use futures_util::{future::BoxFuture, FutureExt};
use std::sync::Arc;

use crate::error::{ConfigResult, ConfigurationError};
use crate::filter::{Filter, FilterPhase, Next, SharedFilter};

/// Connection-scoped headers that must not be forwarded.
static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn parse_name(name: &str) -> ConfigResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ConfigurationError::HeaderName(name.to_string()))
}

fn parse_value(name: &str, value: &str) -> ConfigResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| ConfigurationError::HeaderValue(name.to_string()))
}

/// Set `name: value` on the response, replacing any existing values.
pub fn add_response_header(name: &str, value: &str) -> ConfigResult<SharedFilter> {
    Ok(Arc::new(AddResponseHeader {
        name: parse_name(name)?,
        value: parse_value(name, value)?,
    }))
}

/// Drop `name` from the response.
pub fn remove_response_header(name: &str) -> ConfigResult<SharedFilter> {
    Ok(Arc::new(RemoveResponseHeader {
        name: parse_name(name)?,
    }))
}

/// Append `name: value` to the forwarded request.
pub fn add_request_header(name: &str, value: &str) -> ConfigResult<SharedFilter> {
    Ok(Arc::new(AddRequestHeader {
        name: parse_name(name)?,
        value: parse_value(name, value)?,
    }))
}

/// Drop `name` from the forwarded request.
pub fn remove_request_header(name: &str) -> ConfigResult<SharedFilter> {
    Ok(Arc::new(RemoveRequestHeader {
        name: parse_name(name)?,
    }))
}

/// Strip hop-by-hop headers in both directions, including any listed in `Connection`.
pub fn remove_hop_by_hop_headers() -> SharedFilter {
    Arc::new(RemoveHopByHopHeaders)
}

#[derive(Debug)]
pub struct AddResponseHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl Filter for AddResponseHeader {
    fn phase(&self) -> FilterPhase {
        FilterPhase::Response
    }

    fn apply<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        async move {
            let mut response = next.run(req).await;
            response
                .headers_mut()
                .insert(self.name.clone(), self.value.clone());
            response
        }
        .boxed()
    }
}

#[derive(Debug)]
pub struct RemoveResponseHeader {
    name: HeaderName,
}

impl Filter for RemoveResponseHeader {
    fn phase(&self) -> FilterPhase {
        FilterPhase::Response
    }

    fn apply<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        async move {
            let mut response = next.run(req).await;
            response.headers_mut().remove(&self.name);
            response
        }
        .boxed()
    }
}

#[derive(Debug)]
pub struct AddRequestHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl Filter for AddRequestHeader {
    fn phase(&self) -> FilterPhase {
        FilterPhase::Request
    }

    fn apply<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        req.headers_mut()
            .append(self.name.clone(), self.value.clone());
        next.run(req).boxed()
    }
}

#[derive(Debug)]
pub struct RemoveRequestHeader {
    name: HeaderName,
}

impl Filter for RemoveRequestHeader {
    fn phase(&self) -> FilterPhase {
        FilterPhase::Request
    }

    fn apply<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        req.headers_mut().remove(&self.name);
        next.run(req).boxed()
    }
}

#[derive(Debug)]
pub struct RemoveHopByHopHeaders;

impl RemoveHopByHopHeaders {
    fn strip(headers: &mut HeaderMap) {
        let listed: Vec<HeaderName> = headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
            .collect();

        for name in listed.iter().chain(HOP_BY_HOP.iter()) {
            headers.remove(name);
        }
    }
}

impl Filter for RemoveHopByHopHeaders {
    fn phase(&self) -> FilterPhase {
        FilterPhase::Request
    }

    fn apply<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        Self::strip(req.headers_mut());
        async move {
            let mut response = next.run(req).await;
            Self::strip(response.headers_mut());
            response
        }
        .boxed()
    }
}
