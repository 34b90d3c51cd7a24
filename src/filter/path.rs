//! Path rewriting and status override.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{uri::PathAndQuery, Request, StatusCode, Uri},
    response::Response,
};
use futures_util::{future::BoxFuture, FutureExt};

use crate::error::{ConfigResult, ConfigurationError};
use crate::filter::{Filter, FilterPhase, Next, SharedFilter};

/// Prepend `prefix` to the request path before forwarding.
pub fn prefix_path(prefix: &str) -> ConfigResult<SharedFilter> {
    let trimmed = prefix.trim_end_matches('/');
    if !trimmed.starts_with('/') || PathAndQuery::try_from(trimmed).is_err() {
        return Err(ConfigurationError::Filter {
            filter: "prefix_path",
            reason: format!("{prefix:?} is not an absolute path"),
        });
    }
    Ok(Arc::new(PrefixPath {
        prefix: trimmed.to_string(),
    }))
}

/// Replace the upstream status code.
pub fn set_status(status: u16) -> ConfigResult<SharedFilter> {
    let status = StatusCode::from_u16(status).map_err(|_| ConfigurationError::Filter {
        filter: "set_status",
        reason: format!("{status} is not a valid status code"),
    })?;
    Ok(Arc::new(SetStatus { status }))
}

#[derive(Debug)]
pub struct PrefixPath {
    prefix: String,
}

impl PrefixPath {
    fn rewrite(&self, uri: &Uri) -> Option<Uri> {
        let path_and_query = match uri.query() {
            Some(q) => format!("{}{}?{}", self.prefix, uri.path(), q),
            None => format!("{}{}", self.prefix, uri.path()),
        };
        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
        Uri::from_parts(parts).ok()
    }
}

impl Filter for PrefixPath {
    fn phase(&self) -> FilterPhase {
        FilterPhase::Request
    }

    fn apply<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        match self.rewrite(req.uri()) {
            Some(uri) => *req.uri_mut() = uri,
            None => tracing::warn!(prefix = %self.prefix, uri = %req.uri(), "Path prefix rewrite failed"),
        }
        next.run(req).boxed()
    }
}

#[derive(Debug)]
pub struct SetStatus {
    status: StatusCode,
}

impl Filter for SetStatus {
    fn phase(&self) -> FilterPhase {
        FilterPhase::Response
    }

    fn apply<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        async move {
            let mut response = next.run(req).await;
            *response.status_mut() = self.status;
            response
        }
        .boxed()
    }
}
