//! Dynamic route gateway library.
//!
//! Routes are added, replaced and removed at runtime through the admin API;
//! every request is matched against one consistent, atomically installed
//! routing table.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{RouteDefinition, RouteRegistry};
