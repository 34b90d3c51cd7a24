//! Route predicates.
//!
//! # Responsibilities
//! - Match host (exact or wildcard, case-insensitive)
//! - Match path (exact, prefix or glob, case-sensitive)
//! - Match method, header and query parameter
//! - Match the client address against CIDR ranges
//! - Match the time a request arrives (after, before, between)
//! - Combine predicates with AND / OR / NOT
//!
//! # Design Decisions
//! - Patterns are compiled by the constructors; a malformed pattern is a
//!   `ConfigurationError` and never reaches request handling
//! - Evaluation is pure and bounded (no regex)
//! - AND stops at the first false operand, OR at the first true one

use std::fmt;
use std::net::IpAddr;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use axum::http::{HeaderName, Method};
use chrono::{DateTime, TimeZone, Utc};
use ipnet::IpNet;

use crate::error::{ConfigResult, ConfigurationError};
use crate::routing::context::RequestContext;
use crate::routing::pattern::GlobPattern;

/// Trait for matching requests against conditions.
pub trait Predicate: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, ctx: &RequestContext) -> bool;
}

/// Shareable, composable handle to a predicate.
#[derive(Clone)]
pub struct RoutePredicate(Arc<dyn Predicate>);

impl RoutePredicate {
    /// Wrap any predicate implementation.
    pub fn new(predicate: impl Predicate + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn matches(&self, ctx: &RequestContext) -> bool {
        self.0.matches(ctx)
    }

    /// Both must match. `other` is not evaluated when `self` fails.
    pub fn and(self, other: RoutePredicate) -> Self {
        Self::new(AndPredicate(self, other))
    }

    /// Either must match. `other` is not evaluated when `self` matches.
    pub fn or(self, other: RoutePredicate) -> Self {
        Self::new(OrPredicate(self, other))
    }

    /// Inverts the result.
    pub fn negate(self) -> Self {
        Self::new(NotPredicate(self))
    }
}

impl fmt::Debug for RoutePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl BitAnd for RoutePredicate {
    type Output = RoutePredicate;

    fn bitand(self, rhs: RoutePredicate) -> RoutePredicate {
        self.and(rhs)
    }
}

impl BitOr for RoutePredicate {
    type Output = RoutePredicate;

    fn bitor(self, rhs: RoutePredicate) -> RoutePredicate {
        self.or(rhs)
    }
}

impl Not for RoutePredicate {
    type Output = RoutePredicate;

    fn not(self) -> RoutePredicate {
        self.negate()
    }
}

/// Match the Host header against `pattern`.
pub fn host(pattern: &str) -> ConfigResult<RoutePredicate> {
    let pattern = GlobPattern::host(pattern).map_err(|reason| ConfigurationError::HostPattern {
        pattern: pattern.to_string(),
        reason,
    })?;
    Ok(RoutePredicate::new(HostPredicate { pattern }))
}

/// Match the request path against `pattern`.
pub fn path(pattern: &str) -> ConfigResult<RoutePredicate> {
    let pattern = GlobPattern::path(pattern).map_err(|reason| ConfigurationError::PathPattern {
        pattern: pattern.to_string(),
        reason,
    })?;
    Ok(RoutePredicate::new(PathPredicate { pattern }))
}

/// Match the request method.
pub fn method(method: &str) -> ConfigResult<RoutePredicate> {
    let parsed = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigurationError::Method(method.to_string()))?;
    Ok(RoutePredicate::new(MethodPredicate { method: parsed }))
}

/// Match a header by presence, or by exact value when `value` is given.
pub fn header(name: &str, value: Option<&str>) -> ConfigResult<RoutePredicate> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ConfigurationError::HeaderName(name.to_string()))?;
    Ok(RoutePredicate::new(HeaderPredicate {
        name,
        value: value.map(str::to_string),
    }))
}

/// Match a query parameter by presence, or by exact value when `value` is given.
pub fn query(name: &str, value: Option<&str>) -> RoutePredicate {
    RoutePredicate::new(QueryPredicate {
        name: name.to_string(),
        value: value.map(str::to_string),
    })
}

/// Match the client address against CIDR ranges (`10.0.0.0/8`) or single
/// addresses. Requests without a known peer address never match.
pub fn remote_addr<S: AsRef<str>>(ranges: &[S]) -> ConfigResult<RoutePredicate> {
    let ranges = ranges
        .iter()
        .map(|range| parse_range(range.as_ref()))
        .collect::<ConfigResult<Vec<_>>>()?;
    if ranges.is_empty() {
        return Err(ConfigurationError::AddressRange(String::new()));
    }
    Ok(RoutePredicate::new(RemoteAddrPredicate { ranges }))
}

/// Matches requests arriving after `datetime`.
pub fn after(datetime: &str) -> ConfigResult<RoutePredicate> {
    Ok(RoutePredicate::new(TimePredicate {
        after: Some(parse_datetime(datetime)?),
        before: None,
    }))
}

/// Matches requests arriving before `datetime`.
pub fn before(datetime: &str) -> ConfigResult<RoutePredicate> {
    Ok(RoutePredicate::new(TimePredicate {
        after: None,
        before: Some(parse_datetime(datetime)?),
    }))
}

/// Matches requests arriving after `start` and before `end`.
pub fn between(start: &str, end: &str) -> ConfigResult<RoutePredicate> {
    let (from, until) = (parse_datetime(start)?, parse_datetime(end)?);
    if from >= until {
        return Err(ConfigurationError::DateTime {
            value: format!("{start}..{end}"),
            reason: "start must be earlier than end".into(),
        });
    }
    Ok(RoutePredicate::new(TimePredicate {
        after: Some(from),
        before: Some(until),
    }))
}

/// Parse an RFC 3339 timestamp or epoch milliseconds.
///
/// A trailing zone name in brackets (`2017-01-20T17:42:47.789-07:00[America/Denver]`)
/// is accepted and ignored; the offset alone fixes the instant.
pub fn parse_datetime(value: &str) -> ConfigResult<DateTime<Utc>> {
    let fail = |reason: String| ConfigurationError::DateTime {
        value: value.to_string(),
        reason,
    };
    let trimmed = value.trim();

    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = trimmed.parse().map_err(|e| fail(format!("{e}")))?;
        return Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| fail("out of range".into()));
    }

    let without_zone = match trimmed.find('[') {
        Some(start) if trimmed.ends_with(']') => &trimmed[..start],
        _ => trimmed,
    };
    DateTime::parse_from_rfc3339(without_zone)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| fail(e.to_string()))
}

fn parse_range(value: &str) -> ConfigResult<IpNet> {
    let value = value.trim();
    value
        .parse::<IpNet>()
        .or_else(|_| value.parse::<IpAddr>().map(IpNet::from))
        .map_err(|_| ConfigurationError::AddressRange(value.to_string()))
}

/// Matches every request.
pub fn always() -> RoutePredicate {
    RoutePredicate::new(Always)
}

pub fn and(left: RoutePredicate, right: RoutePredicate) -> RoutePredicate {
    left.and(right)
}

pub fn or(left: RoutePredicate, right: RoutePredicate) -> RoutePredicate {
    left.or(right)
}

pub fn not(inner: RoutePredicate) -> RoutePredicate {
    inner.negate()
}

/// Build a predicate from a closure. `name` shows up in debug output.
pub fn from_fn<F>(name: &'static str, f: F) -> RoutePredicate
where
    F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
{
    RoutePredicate::new(FnPredicate { name, f })
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostPredicate {
    pattern: GlobPattern,
}

impl Predicate for HostPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        !ctx.host().is_empty() && self.pattern.matches(ctx.host())
    }
}

/// Matches the request path.
#[derive(Debug, Clone)]
pub struct PathPredicate {
    pattern: GlobPattern,
}

impl Predicate for PathPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        self.pattern.matches(ctx.path())
    }
}

#[derive(Debug, Clone)]
pub struct MethodPredicate {
    method: Method,
}

impl Predicate for MethodPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        *ctx.method() == self.method
    }
}

#[derive(Debug, Clone)]
pub struct HeaderPredicate {
    name: HeaderName,
    value: Option<String>,
}

impl Predicate for HeaderPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        let mut values = ctx.headers().get_all(&self.name).iter();
        match &self.value {
            None => values.next().is_some(),
            Some(expected) => values.any(|v| v.as_bytes() == expected.as_bytes()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryPredicate {
    name: String,
    value: Option<String>,
}

impl Predicate for QueryPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        match (ctx.query_param(&self.name), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteAddrPredicate {
    ranges: Vec<IpNet>,
}

impl Predicate for RemoteAddrPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        let Some(addr) = ctx.client_addr() else {
            return false;
        };
        let ip = addr.ip().to_canonical();
        self.ranges.iter().any(|range| range.contains(&ip))
    }
}

/// Compares the current time against fixed instants. Both bounds are exclusive.
#[derive(Debug, Clone)]
pub struct TimePredicate {
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
}

impl Predicate for TimePredicate {
    fn matches(&self, _ctx: &RequestContext) -> bool {
        let now = Utc::now();
        self.after.map_or(true, |after| now > after)
            && self.before.map_or(true, |before| now < before)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Always;

impl Predicate for Always {
    fn matches(&self, _ctx: &RequestContext) -> bool {
        true
    }
}

#[derive(Debug)]
pub struct AndPredicate(RoutePredicate, RoutePredicate);

impl Predicate for AndPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        self.0.matches(ctx) && self.1.matches(ctx)
    }
}

#[derive(Debug)]
pub struct OrPredicate(RoutePredicate, RoutePredicate);

impl Predicate for OrPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        self.0.matches(ctx) || self.1.matches(ctx)
    }
}

#[derive(Debug)]
pub struct NotPredicate(RoutePredicate);

impl Predicate for NotPredicate {
    fn matches(&self, ctx: &RequestContext) -> bool {
        !self.0.matches(ctx)
    }
}

struct FnPredicate<F> {
    name: &'static str,
    f: F,
}

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fn({})", self.name)
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    fn matches(&self, ctx: &RequestContext) -> bool {
        (self.f)(ctx)
    }
}
