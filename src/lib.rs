//! Predicate-routed HTTP gateway library.
//!
//! Routes pair a predicate over request metadata with a filter chain and an
//! upstream. The first route whose predicate holds gets the request.

pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use error::{ConfigurationError, GatewayError};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use routing::{Route, RouteTable, SharedRouteTable};
