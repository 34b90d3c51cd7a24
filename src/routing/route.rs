//! Route values and upstream targets.
//!
//! # Responsibilities
//! - Bind id, predicate, filter chain and upstream target
//! - Validate the target URI when the route is built
//! - Map an inbound request URI onto the target
//!
//! # Design Decisions
//! - Routes are immutable; changing one means building a new value
//! - Only plain `http` upstreams (TLS origination is not handled here)

use std::fmt;
use std::str::FromStr;

use axum::http::{
    uri::{Authority, PathAndQuery, Scheme},
    Uri,
};
use url::Url;

use crate::error::{ConfigResult, ConfigurationError};
use crate::filter::{FilterChain, SharedFilter};
use crate::routing::context::RequestContext;
use crate::routing::predicate::RoutePredicate;

/// A validated upstream base URI.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    url: Url,
    authority: Authority,
    base_path: String,
}

impl UpstreamTarget {
    pub fn parse(uri: &str) -> ConfigResult<Self> {
        let invalid = |reason: &str| ConfigurationError::TargetUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("only http upstreams are supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed"));
        }

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).map_err(|e| invalid(&e.to_string()))?;
        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            url,
            authority,
            base_path,
        })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Rewrite an inbound URI so it points at this upstream.
    ///
    /// The target's path, if any, is prepended to the inbound path; the
    /// inbound query is kept.
    pub fn request_uri(&self, inbound: &Uri) -> Result<Uri, axum::http::Error> {
        let path = inbound.path();
        let path_and_query = match inbound.query() {
            Some(q) => format!("{}{}?{}", self.base_path, path, q),
            None => format!("{}{}", self.base_path, path),
        };

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::try_from(path_and_query)?)
            .build()
    }
}

impl fmt::Debug for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// A single predicate → upstream binding with its filter chain.
#[derive(Debug, Clone)]
pub struct Route {
    id: String,
    order: i32,
    predicate: RoutePredicate,
    filters: FilterChain,
    target: UpstreamTarget,
}

impl Route {
    pub fn builder(id: impl Into<String>) -> RouteBuilder {
        RouteBuilder {
            id: id.into(),
            order: 0,
            uri: None,
            predicate: None,
            filters: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sort key; lower orders are consulted first.
    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn predicate(&self) -> &RoutePredicate {
        &self.predicate
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    pub fn matches(&self, ctx: &RequestContext) -> bool {
        self.predicate.matches(ctx)
    }
}

/// Builder mirroring the declarative route definition.
///
/// ```
/// use route_gateway::filter::add_response_header;
/// use route_gateway::routing::{predicate::{host, path}, Route};
///
/// let route = Route::builder("test-kotlin")
///     .uri("http://httpbin.org:80")
///     .predicate(host("kotlin.abc.org")? & path("/image/png")?)
///     .filter(add_response_header("X-TestHeader", "foobar")?)
///     .build()?;
/// assert_eq!(route.id(), "test-kotlin");
/// # Ok::<(), route_gateway::error::ConfigurationError>(())
/// ```
#[derive(Debug)]
pub struct RouteBuilder {
    id: String,
    order: i32,
    uri: Option<String>,
    predicate: Option<RoutePredicate>,
    filters: Vec<SharedFilter>,
}

impl RouteBuilder {
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Set the predicate. Calling it again ANDs with the previous one.
    pub fn predicate(mut self, predicate: RoutePredicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn filter(mut self, filter: SharedFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = SharedFilter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn build(self) -> ConfigResult<Route> {
        if self.id.trim().is_empty() {
            return Err(ConfigurationError::EmptyRouteId);
        }
        let uri = self.uri.ok_or_else(|| ConfigurationError::TargetUri {
            uri: String::new(),
            reason: format!("route {:?} has no uri", self.id),
        })?;
        let target = UpstreamTarget::parse(&uri)?;
        let predicate = self
            .predicate
            .ok_or_else(|| ConfigurationError::MissingPredicate(self.id.clone()))?;

        Ok(Route {
            id: self.id,
            order: self.order,
            predicate,
            filters: FilterChain::new(self.filters),
            target,
        })
    }
}
