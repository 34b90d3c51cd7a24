//! Timeout enforcement for upstream calls.

use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;

/// Deadlines for one upstream hop.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamTimeouts {
    /// TCP connect deadline, enforced by the connector.
    pub connect: Duration,
    /// Deadline for connect plus response headers.
    pub upstream: Duration,
}

impl UpstreamTimeouts {
    pub fn new(config: &TimeoutConfig) -> Self {
        Self {
            connect: Duration::from_millis(config.connect_ms),
            upstream: Duration::from_millis(config.upstream_ms),
        }
    }

    /// Run `fut` under the upstream deadline. `None` means it expired.
    pub async fn bound<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::time::timeout(self.upstream, fut).await.ok()
    }
}

impl Default for UpstreamTimeouts {
    fn default() -> Self {
        Self::new(&TimeoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_future_is_none() {
        let timeouts = UpstreamTimeouts {
            connect: Duration::from_millis(10),
            upstream: Duration::from_millis(20),
        };

        assert_eq!(timeouts.bound(async { 7 }).await, Some(7));
        let slow = tokio::time::sleep(Duration::from_secs(5));
        assert!(timeouts.bound(slow).await.is_none());
    }
}
