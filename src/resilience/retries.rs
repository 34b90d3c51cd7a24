//! Retry policy.
//!
//! # Design Decisions
//! - Never retry POST/PATCH or other non-idempotent methods
//! - A request is replayable only if its body was buffered in full
//! - Connection failures and timeouts are retryable; of the upstream statuses
//!   only 502, 503 and 504 are

use std::time::Duration;

use axum::http::{Method, StatusCode};

use crate::config::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Whether a failed attempt may be tried again.
///
/// `status` is the upstream status when one was received; `network_error`
/// is true when the attempt failed before any response.
pub fn is_retryable(method: &Method, status: Option<StatusCode>, network_error: bool) -> bool {
    if !method.is_idempotent() {
        return false;
    }
    if network_error {
        return true;
    }
    matches!(
        status,
        Some(StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT)
    )
}

/// Retry limits for one gateway.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_buffered_body: usize,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            max_buffered_body: config.max_buffered_body,
        }
    }

    /// True when retries are configured at all.
    pub fn enabled(&self) -> bool {
        self.max_attempts > 1
    }

    /// Attempts allowed for a request with `method`.
    pub fn attempts_for(&self, method: &Method) -> u32 {
        if method.is_idempotent() {
            self.max_attempts
        } else {
            1
        }
    }

    /// Largest body that is buffered for replay.
    pub fn max_buffered_body(&self) -> usize {
        self.max_buffered_body
    }

    /// Delay before retry number `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
