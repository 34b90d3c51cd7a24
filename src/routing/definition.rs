//! Route definitions → routes.
//!
//! # Responsibilities
//! - Turn `RouteConfig` records into `Route` values
//! - Turn `FilterConfig` records into filters
//! - Parse the compact `id=uri,Host=..,Path=..` form
//!
//! # Design Decisions
//! - Default filters come first, then the route's own filters
//! - Every failure is a `ConfigurationError` for that route only

use crate::config::schema::{
    FilterConfig, NameValueConfig, PredicateConfig, RouteConfig, TimeRangeConfig,
};
use crate::error::{ConfigResult, ConfigurationError};
use crate::filter::{self, SharedFilter};
use crate::routing::predicate::{self, RoutePredicate};
use crate::routing::route::Route;

/// Build a route from its definition.
pub fn build_route(config: &RouteConfig, default_filters: &[FilterConfig]) -> ConfigResult<Route> {
    let predicate = build_predicate(&config.predicate)?
        .ok_or_else(|| ConfigurationError::MissingPredicate(config.id.clone()))?;

    let filters = default_filters
        .iter()
        .chain(config.filters.iter())
        .map(build_filter)
        .collect::<ConfigResult<Vec<_>>>()?;

    Route::builder(config.id.clone())
        .uri(config.uri.clone())
        .order(config.order)
        .predicate(predicate)
        .filters(filters)
        .build()
}

/// Build the conjunction of every condition in `config`.
///
/// Returns `Ok(None)` when no condition is set.
pub fn build_predicate(config: &PredicateConfig) -> ConfigResult<Option<RoutePredicate>> {
    let mut parts: Vec<RoutePredicate> = Vec::new();

    if let Some(host) = &config.host {
        parts.push(predicate::host(host)?);
    }
    if let Some(path) = &config.path {
        parts.push(predicate::path(path)?);
    }
    if let Some(method) = &config.method {
        parts.push(predicate::method(method)?);
    }
    if let Some(NameValueConfig { name, value }) = &config.header {
        parts.push(predicate::header(name, value.as_deref())?);
    }
    if let Some(NameValueConfig { name, value }) = &config.query {
        parts.push(predicate::query(name, value.as_deref()));
    }
    if !config.remote_addr.is_empty() {
        parts.push(predicate::remote_addr(&config.remote_addr)?);
    }
    if let Some(after) = &config.after {
        parts.push(predicate::after(after)?);
    }
    if let Some(before) = &config.before {
        parts.push(predicate::before(before)?);
    }
    if let Some(TimeRangeConfig { start, end }) = &config.between {
        parts.push(predicate::between(start, end)?);
    }

    for required in &config.all_of {
        if let Some(p) = build_predicate(required)? {
            parts.push(p);
        }
    }

    let mut alternatives = Vec::new();
    for alternative in &config.any_of {
        if let Some(p) = build_predicate(alternative)? {
            alternatives.push(p);
        }
    }
    if let Some(any) = alternatives.into_iter().reduce(RoutePredicate::or) {
        parts.push(any);
    }

    if let Some(inner) = &config.not {
        if let Some(p) = build_predicate(inner)? {
            parts.push(p.negate());
        }
    }

    Ok(parts.into_iter().reduce(RoutePredicate::and))
}

/// Build a filter from its definition.
pub fn build_filter(config: &FilterConfig) -> ConfigResult<SharedFilter> {
    match config {
        FilterConfig::AddResponseHeader { name, value } => filter::add_response_header(name, value),
        FilterConfig::RemoveResponseHeader { name } => filter::remove_response_header(name),
        FilterConfig::AddRequestHeader { name, value } => filter::add_request_header(name, value),
        FilterConfig::RemoveRequestHeader { name } => filter::remove_request_header(name),
        FilterConfig::PrefixPath { prefix } => filter::prefix_path(prefix),
        FilterConfig::SetStatus { status } => filter::set_status(*status),
        FilterConfig::RemoveHopByHopHeaders => Ok(filter::remove_hop_by_hop_headers()),
        FilterConfig::RequestRateLimiter {
            replenish_rate,
            burst_capacity,
        } => filter::request_rate_limiter(*replenish_rate, *burst_capacity),
    }
}

/// Parse `id=uri,Name=arg,...` into a route definition.
///
/// Recognized predicate names (case-insensitive): `Host`, `Path`, `Method`,
/// `Header` (`name` or `name:value`), `Query` (`name` or `name:value`),
/// `RemoteAddr` (space-separated ranges), `After`, `Before` and
/// `Between` (`start..end`). Repeated names are ANDed.
pub fn parse_shorthand(text: &str) -> ConfigResult<RouteConfig> {
    let fail = |reason: &str| ConfigurationError::Shorthand {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let (id, rest) = text
        .split_once('=')
        .ok_or_else(|| fail("must be of the form id=uri,..."))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(fail("missing route id"));
    }

    let mut args = rest.split(',').map(str::trim).filter(|s| !s.is_empty());
    let uri = args.next().ok_or_else(|| fail("missing uri"))?;

    let mut conditions = Vec::new();
    for arg in args {
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| fail(&format!("predicate {arg:?} must be of the form Name=value")))?;
        let value = value.trim().to_string();

        let mut condition = PredicateConfig::default();
        match name.trim().to_ascii_lowercase().as_str() {
            "host" => condition.host = Some(value),
            "path" => condition.path = Some(value),
            "method" => condition.method = Some(value),
            "header" => condition.header = Some(name_value(&value)),
            "query" => condition.query = Some(name_value(&value)),
            "remoteaddr" => {
                condition.remote_addr = value.split_whitespace().map(str::to_string).collect()
            }
            "after" => condition.after = Some(value),
            "before" => condition.before = Some(value),
            "between" => {
                let (start, end) = value
                    .split_once("..")
                    .ok_or_else(|| fail("Between must be of the form start..end"))?;
                condition.between = Some(TimeRangeConfig {
                    start: start.trim().to_string(),
                    end: end.trim().to_string(),
                });
            }
            other => return Err(fail(&format!("unknown predicate {other:?}"))),
        }
        conditions.push(condition);
    }

    let predicate = PredicateConfig {
        all_of: conditions,
        ..PredicateConfig::default()
    };

    Ok(RouteConfig {
        id: id.to_string(),
        uri: uri.to_string(),
        order: 0,
        predicate,
        filters: Vec::new(),
    })
}

fn name_value(value: &str) -> NameValueConfig {
    match value.split_once(':') {
        Some((name, value)) => NameValueConfig {
            name: name.trim().to_string(),
            value: Some(value.trim().to_string()),
        },
        None => NameValueConfig {
            name: value.to_string(),
            value: None,
        },
    }
}
