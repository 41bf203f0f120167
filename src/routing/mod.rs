//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Admin mutation (add / update / delete / update_list)
//!     → registry.rs (serialize writers)
//!     → store.rs (stage new snapshot, bump version)
//!     → matcher.rs (compile: predicate.rs evaluators, sort by order)
//!     → atomic swap of Arc<CompiledTable>
//!     → bus.rs (refresh notification, version = N)
//!
//! Incoming Request (method, host, path, headers, query)
//!     → registry.rs resolve (lock-free load of active table)
//!     → predicate.rs (evaluate conditions)
//!     → Return: matched RouteDefinition or NoMatch
//! ```
//!
//! # Design Decisions
//! - Compiled tables are immutable; changes build and install a new one
//! - No regex in hot path (segment globs and prefixes only)
//! - Deterministic: same request and table always match the same route
//! - First match wins (ordered by `order`, then insertion)

pub mod bus;
pub mod definition;
pub mod matcher;
pub mod predicate;
pub mod registry;
pub mod store;

pub use bus::{RefreshBus, RefreshEvent};
pub use definition::{FilterDefinition, PredicateDefinition, RouteDefinition};
pub use matcher::{CompilationError, CompiledTable, Matcher};
pub use predicate::RequestHead;
pub use registry::{RegistryError, RouteRegistry};
pub use store::{RouteStore, StoreError};
