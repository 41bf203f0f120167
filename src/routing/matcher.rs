//! Route table compilation and lookup.
//!
//! # Responsibilities
//! - Compile route definitions into an immutable, ordered table
//! - Reject structurally malformed routes before they can be installed
//! - Resolve a request to the first matching route, or no match
//!
//! # Design Decisions
//! - Compilation is a pure function of its input
//! - Sorted by `order` ascending; ties keep input (insertion) order
//! - O(n) scan in table order; first match wins
//! - Explicit no-match (`None`) rather than a silent default route

use std::sync::Arc;

use thiserror::Error;

use crate::routing::definition::RouteDefinition;
use crate::routing::predicate::{build_predicate, AndMatcher, RequestHead, RequestPredicate};

/// A route that failed to compile. Identifies the offending route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("route `{route_id}` failed to compile: {reason}")]
pub struct CompilationError {
    pub route_id: String,
    pub reason: String,
}

impl CompilationError {
    fn new(route_id: &str, reason: impl Into<String>) -> Self {
        Self {
            route_id: route_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// A definition paired with its evaluator.
#[derive(Debug)]
struct CompiledRoute {
    predicate: AndMatcher,
    definition: Arc<RouteDefinition>,
}

/// Immutable, ordered snapshot of the routes built from one store version.
#[derive(Debug, Default)]
pub struct CompiledTable {
    version: u64,
    routes: Vec<CompiledRoute>,
}

impl CompiledTable {
    /// A table with no routes; every lookup is a miss.
    pub fn empty(version: u64) -> Self {
        Self {
            version,
            routes: Vec::new(),
        }
    }

    /// Store version this table was compiled from.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Definitions in evaluation order.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<RouteDefinition>> {
        self.routes.iter().map(|r| &r.definition)
    }

    /// First route whose predicates all hold, in table order.
    pub fn resolve(&self, req: &RequestHead<'_>) -> Option<&Arc<RouteDefinition>> {
        self.routes
            .iter()
            .find(|r| r.predicate.matches(req))
            .map(|r| &r.definition)
    }
}

/// Compiles definitions into tables and resolves requests against them.
pub struct Matcher;

impl Matcher {
    /// Compile `definitions` (in insertion order) into a table labelled `version`.
    pub fn compile(
        version: u64,
        definitions: &[Arc<RouteDefinition>],
    ) -> Result<CompiledTable, CompilationError> {
        let mut routes = definitions
            .iter()
            .map(compile_route)
            .collect::<Result<Vec<_>, _>>()?;

        // Vec::sort_by_key is stable: equal orders keep insertion order
        routes.sort_by_key(|r| r.definition.order);

        Ok(CompiledTable { version, routes })
    }

    pub fn resolve<'t>(
        req: &RequestHead<'_>,
        table: &'t CompiledTable,
    ) -> Option<&'t Arc<RouteDefinition>> {
        table.resolve(req)
    }
}

fn compile_route(definition: &Arc<RouteDefinition>) -> Result<CompiledRoute, CompilationError> {
    let id = definition.id.as_str();
    if id.trim().is_empty() {
        return Err(CompilationError::new(id, "route id must not be empty"));
    }

    url::Url::parse(&definition.target_uri).map_err(|e| {
        CompilationError::new(id, format!("invalid uri `{}`: {}", definition.target_uri, e))
    })?;

    if let Some(pos) = definition.filters.iter().position(|f| f.name.trim().is_empty()) {
        return Err(CompilationError::new(id, format!("filter #{} has no name", pos)));
    }

    let predicates = definition
        .predicates
        .iter()
        .map(|p| build_predicate(p).map_err(|e| CompilationError::new(id, e.to_string())))
        .collect::<Result<Vec<Box<dyn RequestPredicate>>, _>>()?;

    Ok(CompiledRoute {
        predicate: AndMatcher::new(predicates),
        definition: Arc::clone(definition),
    })
}
