//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → routing::definition builds the RouteTable from `routes`
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Route definitions are validated per route when the table is built

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    FilterConfig, GatewayConfig, ListenerConfig, LogFormat, NameValueConfig, ObservabilityConfig,
    PredicateConfig, RetryConfig, RouteConfig, TimeoutConfig,
};
