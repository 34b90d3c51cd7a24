//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream and request timeouts.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Filters prepended to every route's own filters.
    pub default_filters: Vec<FilterConfig>,

    /// Route definitions, in declaration order.
    pub routes: Vec<RouteConfig>,

    /// Routes in the compact `id=uri,Host=..,Path=..` form, appended after `routes`.
    pub shorthand_routes: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            retries: RetryConfig::default(),
            observability: ObservabilityConfig::default(),
            default_filters: vec![FilterConfig::RemoveHopByHopHeaders],
            routes: Vec::new(),
            shorthand_routes: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A single route definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Unique route identifier, used in logs and metrics.
    pub id: String,

    /// Absolute upstream URI (e.g., "http://httpbin.org:80").
    pub uri: String,

    /// Sort key. Lower orders are consulted first; ties keep declaration order.
    #[serde(default)]
    pub order: i32,

    /// Match conditions.
    #[serde(default)]
    pub predicate: PredicateConfig,

    /// Filters, in the order they apply.
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// Match conditions. All set fields must hold (AND).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PredicateConfig {
    /// Host pattern (`kotlin.abc.org`, `*.abc.org`, `**.abc.org`).
    pub host: Option<String>,

    /// Path pattern (`/image/png`, `/api/**`, `/image/*.png`).
    pub path: Option<String>,

    /// HTTP method.
    pub method: Option<String>,

    /// Header presence or value.
    pub header: Option<NameValueConfig>,

    /// Query parameter presence or value.
    pub query: Option<NameValueConfig>,

    /// Client address ranges (`10.0.0.0/8`, `192.168.1.7`). Any may match.
    pub remote_addr: Vec<String>,

    /// Match only after this instant (RFC 3339 or epoch milliseconds).
    pub after: Option<String>,

    /// Match only before this instant.
    pub before: Option<String>,

    /// Match only between two instants.
    pub between: Option<TimeRangeConfig>,

    /// Every one of these must hold (AND).
    pub all_of: Vec<PredicateConfig>,

    /// At least one of these must hold (OR).
    pub any_of: Vec<PredicateConfig>,

    /// This must not hold.
    pub not: Option<Box<PredicateConfig>>,
}

/// A pair of instants, both exclusive.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeRangeConfig {
    pub start: String,
    pub end: String,
}

/// A name with an optional exact value.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NameValueConfig {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Filter definitions, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    AddResponseHeader { name: String, value: String },
    RemoveResponseHeader { name: String },
    AddRequestHeader { name: String, value: String },
    RemoveRequestHeader { name: String },
    PrefixPath { prefix: String },
    SetStatus { status: u16 },
    RemoveHopByHopHeaders,
    RequestRateLimiter { replenish_rate: u32, burst_capacity: u32 },
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Bound on connect plus upstream response headers, in milliseconds.
    pub upstream_ms: u64,

    /// Total time for a client request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            upstream_ms: 30_000,
            request_secs: 60,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first. 1 disables retries.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Largest request body buffered so it can be replayed, in bytes.
    pub max_buffered_body: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            max_buffered_body: 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
