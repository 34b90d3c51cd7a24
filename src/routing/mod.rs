//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, method, headers, query)
//!     → context.rs (normalized routing view)
//!     → table.rs (ordered scan)
//!     → predicate.rs (evaluate match conditions)
//!     → Return: matched Route or no match
//!
//! Route Compilation (at startup):
//!     RouteConfig[] + shorthand routes
//!     → definition.rs (patterns, filters, target URI)
//!     → Sort by order
//!     → Publish as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled up front, immutable once published
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by `order`, then declaration)
//! - A broken route is skipped, never fatal

pub mod context;
pub mod definition;
pub mod pattern;
pub mod predicate;
pub mod route;
pub mod table;

pub use context::RequestContext;
pub use predicate::{Predicate, RoutePredicate};
pub use route::{Route, RouteBuilder, UpstreamTarget};
pub use table::{RouteTable, SharedRouteTable};
