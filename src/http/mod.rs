//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → router.rs (route lookup, filter chain)
//!     → forward.rs (upstream call)
//!     → response.rs (upstream response or gateway error)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use router::{GatewayRouter, RequestState};
pub use server::GatewayServer;
