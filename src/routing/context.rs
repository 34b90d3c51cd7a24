//! Per-request routing metadata.
//!
//! # Responsibilities
//! - Extract the fields predicates look at (host, path, method, headers,
//!   query, peer address)
//! - Normalize the host once so predicates never re-parse it
//!
//! # Design Decisions
//! - Built once per request and owned by the request's task
//! - Host is lowercased and stripped of its port
//! - Missing Host header falls back to the URI authority (HTTP/2 `:authority`)

use std::net::SocketAddr;

use axum::http::{header, request::Parts, HeaderMap, Method, Request, Uri};

/// Snapshot of the request metadata used for route selection.
#[derive(Debug, Clone)]
pub struct RequestContext {
    host: String,
    path: String,
    query: Option<String>,
    method: Method,
    headers: HeaderMap,
    client_addr: Option<SocketAddr>,
}

impl RequestContext {
    /// Build a context from request parts.
    pub fn from_parts(parts: &Parts, client_addr: Option<SocketAddr>) -> Self {
        Self::build(&parts.method, &parts.uri, &parts.headers, client_addr)
    }

    /// Build a context from a full request.
    pub fn from_request<B>(req: &Request<B>, client_addr: Option<SocketAddr>) -> Self {
        Self::build(req.method(), req.uri(), req.headers(), client_addr)
    }

    fn build(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        client_addr: Option<SocketAddr>,
    ) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        Self {
            host: normalize_host(&host),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            method: method.clone(),
            headers: headers.clone(),
            client_addr,
        }
    }

    /// Lowercased host without port. Empty if the request carried none.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// Look up a query parameter by name. The first occurrence wins.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }
}

/// Lowercase a host and strip an optional port, keeping IPv6 brackets intact.
fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let without_port = if raw.starts_with('[') {
        match raw.find(']') {
            Some(end) => &raw[..=end],
            None => raw,
        }
    } else {
        raw.split(':').next().unwrap_or(raw)
    };
    without_port.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn host_is_normalized() {
        let req = Request::builder()
            .uri("/image/png?size=large&x")
            .header("Host", "Kotlin.ABC.org:8080")
            .body(Body::empty())
            .unwrap();
        let ctx = RequestContext::from_request(&req, None);

        assert_eq!(ctx.host(), "kotlin.abc.org");
        assert_eq!(ctx.path(), "/image/png");
        assert_eq!(ctx.query_param("size"), Some("large"));
        assert_eq!(ctx.query_param("x"), Some(""));
        assert_eq!(ctx.query_param("missing"), None);
    }

    #[test]
    fn authority_fallback_and_ipv6() {
        let req = Request::builder()
            .uri("http://[::1]:9000/health")
            .body(Body::empty())
            .unwrap();
        let ctx = RequestContext::from_request(&req, None);
        assert_eq!(ctx.host(), "[::1]");
        assert_eq!(ctx.path(), "/health");
    }
}
