//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch listener:
//!     → request.rs (add / propagate request ID)
//!     → server.rs dispatch handler
//!     → routing registry resolve (active table)
//!     → selected route or 404
//!
//! Admin listener:
//!     → admin auth (Bearer key)
//!     → admin handlers → routing registry mutations
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer, RouteSelection};
