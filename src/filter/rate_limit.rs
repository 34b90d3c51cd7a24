//! Request rate limiting filter.
//!
//! A token bucket per client IP. Buckets refill at `replenish_rate` tokens per
//! second up to `burst_capacity`. An empty bucket short-circuits the chain with
//! 429 Too Many Requests; the upstream is never contacted.
//!
//! A bucket idle for `burst_capacity / replenish_rate` seconds is full again,
//! indistinguishable from a new one, and is dropped the next time an unseen
//! client arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::Response,
};
use dashmap::DashMap;
use futures_util::{future::BoxFuture, FutureExt};

use crate::error::{ConfigResult, ConfigurationError};
use crate::filter::{Filter, FilterPhase, Next, SharedFilter};
use crate::observability::metrics;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Build a per-client rate limiter.
pub fn request_rate_limiter(replenish_rate: u32, burst_capacity: u32) -> ConfigResult<SharedFilter> {
    if replenish_rate == 0 || burst_capacity == 0 {
        return Err(ConfigurationError::Filter {
            filter: "request_rate_limiter",
            reason: "replenish_rate and burst_capacity must be positive".into(),
        });
    }
    Ok(Arc::new(RequestRateLimiter::new(replenish_rate, burst_capacity)))
}

#[derive(Debug)]
pub struct RequestRateLimiter {
    buckets: DashMap<String, TokenBucket>,
    replenish_rate: f64,
    burst_capacity: f64,
}

impl RequestRateLimiter {
    pub fn new(replenish_rate: u32, burst_capacity: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            replenish_rate: replenish_rate as f64,
            burst_capacity: burst_capacity as f64,
        }
    }

    fn check(&self, key: &str) -> bool {
        if !self.buckets.contains_key(key) {
            self.evict_idle();
        }
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst_capacity));
        bucket.try_acquire(self.burst_capacity, self.replenish_rate)
    }

    /// Time for an empty bucket to refill completely.
    fn refill_window(&self) -> Duration {
        Duration::from_secs_f64(self.burst_capacity / self.replenish_rate)
    }

    fn evict_idle(&self) {
        let window = self.refill_window();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.last_update.elapsed() < window);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::trace!(evicted, remaining = self.buckets.len(), "Evicted idle rate limit buckets");
        }
    }

    fn key_for(req: &Request<Body>) -> String {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl Filter for RequestRateLimiter {
    fn phase(&self) -> FilterPhase {
        FilterPhase::Request
    }

    fn apply<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        let key = Self::key_for(&req);
        if self.check(&key) {
            return next.run(req).boxed();
        }

        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        async move {
            let mut response = Response::new(Body::from("Rate limit exceeded"));
            *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
            response
        }
        .boxed()
    }
}
