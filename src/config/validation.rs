//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, attempts >= 1)
//! - Keep the whole-request deadline above the longest upstream wait, so an
//!   upstream timeout is reported as 502 rather than cut off as 408
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Route definitions are NOT checked here: a broken route is skipped when the
//!   route table is built and never prevents startup

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: {value:?} is not a socket address")]
    Address { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffRange { base: u64, max: u64 },

    #[error(
        "timeouts.request_secs ({request_secs}s) must exceed the longest upstream wait \
         ({upstream_wait_ms}ms across all attempts and backoff)"
    )]
    RequestTimeout { request_secs: u64, upstream_wait_ms: u64 },

    #[error("observability.log_level: unknown level {0:?}")]
    LogLevel(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_ms"));
    }
    if config.timeouts.upstream_ms == 0 {
        errors.push(ValidationError::Zero("timeouts.upstream_ms"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::Zero("retries.max_attempts"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::BackoffRange {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }

    let upstream_wait_ms = longest_upstream_wait_ms(config);
    if config.timeouts.request_secs > 0
        && config.timeouts.request_secs.saturating_mul(1000) <= upstream_wait_ms
    {
        errors.push(ValidationError::RequestTimeout {
            request_secs: config.timeouts.request_secs,
            upstream_wait_ms,
        });
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Worst case spent on the upstream hop: every attempt runs to its deadline
/// with the longest backoff between attempts.
fn longest_upstream_wait_ms(config: &GatewayConfig) -> u64 {
    let attempts = u64::from(config.retries.max_attempts.max(1));
    config
        .timeouts
        .upstream_ms
        .saturating_mul(attempts)
        .saturating_add(config.retries.max_delay_ms.saturating_mul(attempts - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.timeouts.upstream_ms = 0;
        config.retries.max_attempts = 0;
        config.retries.base_delay_ms = 5_000;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();

        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::Zero("timeouts.upstream_ms")));
        assert!(errors.contains(&ValidationError::LogLevel("loud".into())));
    }

    #[test]
    fn request_deadline_must_outlast_upstream_wait() {
        let mut config = GatewayConfig::default();
        config.timeouts.upstream_ms = 3_000;
        config.timeouts.request_secs = 1;

        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::RequestTimeout {
                request_secs: 1,
                upstream_wait_ms: 3_000,
            }])
        );

        // Equal is still too short: the request layer would fire first
        config.timeouts.request_secs = 3;
        assert!(validate_config(&config).is_err());
        config.timeouts.request_secs = 4;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn retries_count_towards_upstream_wait() {
        // Defaults: 30s upstream, 60s per request, 2s max backoff
        let mut config = GatewayConfig::default();
        config.retries.max_attempts = 2;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::RequestTimeout {
                request_secs: 60,
                upstream_wait_ms: 62_000,
            }]
        );

        config.timeouts.request_secs = 63;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn broken_routes_do_not_fail_validation() {
        let mut config = GatewayConfig::default();
        config.shorthand_routes.push("garbage".into());
        assert!(validate_config(&config).is_ok());
    }
}
