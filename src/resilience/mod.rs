//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (connect deadline, upstream deadline)
//!     → On failure: retries.rs (check if retryable, retry with backoff.rs)
//! ```
//!
//! # Design Decisions
//! - Every upstream call has a deadline
//! - Retries only for idempotent requests with a replayable body
//! - Retries are off unless configured

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{is_retryable, RetryPolicy};
pub use timeouts::UpstreamTimeouts;
