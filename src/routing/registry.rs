//! Route registry: the single writer of the routing table.
//!
//! # Refresh Protocol
//! ```text
//! add / update_by_id / delete / update_list / refresh
//!     → take mutation lock
//!     → stage the change on a store snapshot
//!     → Matcher::compile(staged)
//!     → commit staged state to the store
//!     → swap the active CompiledTable (ArcSwap)
//!     → RefreshBus::publish(version)
//! ```
//!
//! Any failure before the commit leaves the store and the active table exactly
//! as they were. `resolve` reads the active table without touching the lock,
//! so it sees either the table before a mutation or the one after it.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use axum::http::Request;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::RegistryConfig;
use crate::observability::metrics;
use crate::routing::bus::{RefreshBus, RefreshEvent};
use crate::routing::definition::RouteDefinition;
use crate::routing::matcher::{CompilationError, CompiledTable, Matcher};
use crate::routing::predicate::RequestHead;
use crate::routing::store::{RouteStore, StoreError, StoreSnapshot};

/// Caller-facing mutation failures. `Display` is the admin result string.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The referenced route id is not in the store.
    #[error("not found")]
    NotFound(String),

    /// The store rejected the write; nothing was refreshed.
    #[error("store write failed")]
    StoreWrite(#[source] StoreError),

    /// A route did not compile; the previous table stays active.
    #[error("compile failed: {}", .0.route_id)]
    Compile(#[from] CompilationError),
}

impl RegistryError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::NotFound(_) => "not_found",
            RegistryError::StoreWrite(_) => "store_write_failed",
            RegistryError::Compile(_) => "compile_failed",
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => RegistryError::NotFound(id),
            other => RegistryError::StoreWrite(other),
        }
    }
}

/// Owns the store, the active table and the refresh bus.
#[derive(Debug)]
pub struct RouteRegistry {
    store: RouteStore,
    active: ArcSwap<CompiledTable>,
    bus: RefreshBus,
    mutation: Mutex<()>,
}

impl RouteRegistry {
    /// Create a registry over an empty store.
    pub fn new(max_routes: usize, bus: RefreshBus) -> Self {
        Self {
            store: RouteStore::new(max_routes),
            active: ArcSwap::from_pointee(CompiledTable::empty(0)),
            bus,
            mutation: Mutex::new(()),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(
            config.max_routes,
            RefreshBus::new(config.refresh_channel_capacity),
        )
    }

    /// Insert or replace a route, then refresh.
    pub fn add(&self, definition: RouteDefinition) -> Result<RefreshEvent, RegistryError> {
        tracing::info!(route_id = %definition.id, "Adding route");
        let limit = self.store.max_routes();
        self.apply("add", move |base| base.with_put(definition, limit))
    }

    /// Delete any route with the same id, put the new one, then refresh.
    /// An unknown id behaves like `add`; the route lands last in insertion order.
    pub fn update_by_id(&self, definition: RouteDefinition) -> Result<RefreshEvent, RegistryError> {
        tracing::info!(route_id = %definition.id, "Updating route");
        let limit = self.store.max_routes();
        self.apply("update", move |base| base.with_reinserted(definition, limit))
    }

    pub fn delete(&self, id: &str) -> Result<RefreshEvent, RegistryError> {
        tracing::info!(route_id = %id, "Deleting route");
        self.apply("delete", |base| base.with_delete(id))
    }

    /// Replace the whole route set in one transition and one refresh.
    pub fn update_list(
        &self,
        definitions: Vec<RouteDefinition>,
    ) -> Result<RefreshEvent, RegistryError> {
        tracing::info!(routes = definitions.len(), "Replacing route list");
        let limit = self.store.max_routes();
        self.apply("update_list", move |base| base.with_replaced(definitions, limit))
    }

    /// Recompile current store contents and republish without mutating.
    pub fn refresh(&self) -> Result<RefreshEvent, RegistryError> {
        let _guard = self.lock();
        let snapshot = self.store.snapshot();
        let table = Matcher::compile(snapshot.version(), &snapshot.definitions())
            .inspect_err(|e| self.rejected("refresh", &RegistryError::Compile(e.clone())))?;
        Ok(self.install(table))
    }

    /// Match a request against the active table. Never blocks on writers.
    pub fn resolve<B>(&self, req: &Request<B>) -> Option<Arc<RouteDefinition>> {
        self.resolve_head(&RequestHead::from_request(req))
    }

    pub fn resolve_head(&self, head: &RequestHead<'_>) -> Option<Arc<RouteDefinition>> {
        self.active.load().resolve(head).cloned()
    }

    /// The table `resolve` currently reads.
    pub fn active_table(&self) -> Arc<CompiledTable> {
        self.active.load_full()
    }

    /// Store version of the active table.
    pub fn version(&self) -> u64 {
        self.active.load().version()
    }

    pub fn get(&self, id: &str) -> Result<Arc<RouteDefinition>, RegistryError> {
        Ok(self.store.get(id)?)
    }

    pub fn list_all(&self) -> Vec<Arc<RouteDefinition>> {
        self.store.list_all()
    }

    pub fn store(&self) -> &RouteStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.bus.subscribe()
    }

    fn apply<F>(&self, op: &'static str, stage: F) -> Result<RefreshEvent, RegistryError>
    where
        F: FnOnce(&StoreSnapshot) -> Result<StoreSnapshot, StoreError>,
    {
        let _guard = self.lock();
        self.transact(stage)
            .inspect(|_| metrics::record_mutation(op, "success"))
            .inspect_err(|e| self.rejected(op, e))
    }

    /// Stage, compile, commit, install. Caller holds the mutation lock.
    fn transact<F>(&self, stage: F) -> Result<RefreshEvent, RegistryError>
    where
        F: FnOnce(&StoreSnapshot) -> Result<StoreSnapshot, StoreError>,
    {
        let base = self.store.snapshot();
        let staged = stage(base.as_ref())?;
        let table = Matcher::compile(staged.version(), &staged.definitions())?;
        self.store.install(&base, staged)?;
        Ok(self.install(table))
    }

    fn install(&self, table: CompiledTable) -> RefreshEvent {
        let event = RefreshEvent {
            version: table.version(),
            routes: table.len(),
        };
        self.active.store(Arc::new(table));
        let delivered = self.bus.publish(event);
        tracing::info!(
            version = event.version,
            routes = event.routes,
            subscribers = delivered,
            "Routing table refreshed"
        );
        event
    }

    fn rejected(&self, op: &'static str, err: &RegistryError) {
        metrics::record_mutation(op, err.kind());
        match err {
            RegistryError::NotFound(id) => {
                tracing::warn!(op, route_id = %id, "Route not found");
            }
            RegistryError::StoreWrite(e) => {
                tracing::warn!(op, error = %e, "Store write failed; table unchanged");
            }
            RegistryError::Compile(e) => {
                tracing::warn!(op, route_id = %e.route_id, reason = %e.reason, "Route compilation failed; keeping current table");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.mutation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::from_config(&RegistryConfig::default())
    }
}
