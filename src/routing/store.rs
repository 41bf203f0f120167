//! In-memory route store.
//!
//! # Responsibilities
//! - Authoritative mapping from route id to definition
//! - Version counter bumped on every successful mutation
//! - Lock-free snapshot reads while writers mutate
//!
//! # Design Decisions
//! - Copy-on-write: each mutation builds a new `StoreSnapshot` and swaps it in,
//!   so bulk replacement is one transition and never observed half-done
//! - Writers serialize on a mutex; readers only load an `ArcSwap`
//! - Insertion order is tracked for stable tie-breaking during matching

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::routing::definition::RouteDefinition;

/// Default upper bound on stored routes.
pub const DEFAULT_MAX_ROUTES: usize = 10_000;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Referenced id is not in the store.
    #[error("route `{0}` not found")]
    NotFound(String),

    /// Definitions must carry a non-empty id.
    #[error("route id must not be empty")]
    InvalidId,

    /// Write would exceed the configured route limit.
    #[error("route store is full ({limit} routes)")]
    CapacityExceeded { limit: usize },

    /// A staged write was based on a version that is no longer current.
    #[error("store moved from version {expected} to {found} before the write landed")]
    Conflict { expected: u64, found: u64 },
}

#[derive(Debug, Clone)]
struct StoredRoute {
    seq: u64,
    definition: Arc<RouteDefinition>,
}

/// Immutable view of the store at one version.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    version: u64,
    next_seq: u64,
    entries: HashMap<String, StoredRoute>,
}

impl StoreSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<RouteDefinition>> {
        self.entries.get(id).map(|e| &e.definition)
    }

    /// All definitions in insertion order.
    pub fn definitions(&self) -> Vec<Arc<RouteDefinition>> {
        let mut stored: Vec<&StoredRoute> = self.entries.values().collect();
        stored.sort_by_key(|e| e.seq);
        stored.into_iter().map(|e| Arc::clone(&e.definition)).collect()
    }

    /// Insert or replace by id. A replaced route keeps its position.
    pub fn with_put(&self, definition: RouteDefinition, limit: usize) -> Result<Self, StoreError> {
        let mut next = self.clone();
        next.insert(definition, limit)?;
        next.version += 1;
        Ok(next)
    }

    pub fn with_delete(&self, id: &str) -> Result<Self, StoreError> {
        let mut next = self.clone();
        next.entries
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        next.version += 1;
        Ok(next)
    }

    /// Drop any entry with the same id, then insert at the end. Unknown ids
    /// are simply inserted.
    pub fn with_reinserted(
        &self,
        definition: RouteDefinition,
        limit: usize,
    ) -> Result<Self, StoreError> {
        let mut next = self.clone();
        next.entries.remove(&definition.id);
        next.insert(definition, limit)?;
        next.version += 1;
        Ok(next)
    }

    /// Discard every entry and install `definitions`. Later duplicates win.
    pub fn with_replaced(
        &self,
        definitions: Vec<RouteDefinition>,
        limit: usize,
    ) -> Result<Self, StoreError> {
        let mut next = Self {
            version: self.version,
            next_seq: self.next_seq,
            entries: HashMap::with_capacity(definitions.len()),
        };
        for definition in definitions {
            next.insert(definition, limit)?;
        }
        next.version += 1;
        Ok(next)
    }

    fn insert(&mut self, definition: RouteDefinition, limit: usize) -> Result<(), StoreError> {
        if definition.id.trim().is_empty() {
            return Err(StoreError::InvalidId);
        }

        let definition = Arc::new(definition);
        if let Some(existing) = self.entries.get_mut(&definition.id) {
            existing.definition = definition;
            return Ok(());
        }

        if self.entries.len() >= limit {
            return Err(StoreError::CapacityExceeded { limit });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries
            .insert(definition.id.clone(), StoredRoute { seq, definition });
        Ok(())
    }
}

/// Thread-safe route store.
#[derive(Debug)]
pub struct RouteStore {
    state: ArcSwap<StoreSnapshot>,
    write_lock: Mutex<()>,
    max_routes: usize,
}

impl RouteStore {
    /// Create an empty store holding at most `max_routes` routes.
    pub fn new(max_routes: usize) -> Self {
        Self {
            state: ArcSwap::from_pointee(StoreSnapshot::default()),
            write_lock: Mutex::new(()),
            max_routes,
        }
    }

    pub fn max_routes(&self) -> usize {
        self.max_routes
    }

    pub fn version(&self) -> u64 {
        self.state.load().version
    }

    /// Current state; stays valid while the store keeps changing.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.state.load_full()
    }

    pub fn get(&self, id: &str) -> Result<Arc<RouteDefinition>, StoreError> {
        self.state
            .load()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn list_all(&self) -> Vec<Arc<RouteDefinition>> {
        self.state.load().definitions()
    }

    /// Insert or replace. Returns the new version.
    pub fn put(&self, definition: RouteDefinition) -> Result<u64, StoreError> {
        let limit = self.max_routes;
        self.commit(|cur| cur.with_put(definition, limit))
    }

    pub fn delete(&self, id: &str) -> Result<u64, StoreError> {
        self.commit(|cur| cur.with_delete(id))
    }

    pub fn replace_all(&self, definitions: Vec<RouteDefinition>) -> Result<u64, StoreError> {
        let limit = self.max_routes;
        self.commit(|cur| cur.with_replaced(definitions, limit))
    }

    /// Commit a state staged from `base`, provided nothing landed in between.
    pub fn install(&self, base: &StoreSnapshot, next: StoreSnapshot) -> Result<u64, StoreError> {
        self.commit(|cur| {
            if cur.version != base.version {
                return Err(StoreError::Conflict {
                    expected: base.version,
                    found: cur.version,
                });
            }
            Ok(next)
        })
    }

    fn commit<F>(&self, stage: F) -> Result<u64, StoreError>
    where
        F: FnOnce(&StoreSnapshot) -> Result<StoreSnapshot, StoreError>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.state.load_full();
        let next = stage(current.as_ref())?;
        let version = next.version;
        self.state.store(Arc::new(next));
        Ok(version)
    }
}

impl Default for RouteStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str) -> RouteDefinition {
        RouteDefinition::new(id, format!("lb://{}", id))
    }

    fn ids(store: &RouteStore) -> Vec<String> {
        store.list_all().iter().map(|d| d.id.clone()).collect()
    }

    #[test]
    fn test_put_get_delete() {
        let store = RouteStore::default();
        assert_eq!(store.version(), 0);

        assert_eq!(store.put(def("a")).unwrap(), 1);
        assert_eq!(store.get("a").unwrap().target_uri, "lb://a");

        assert_eq!(store.delete("a").unwrap(), 2);
        assert_eq!(store.get("a").unwrap_err(), StoreError::NotFound("a".into()));
    }

    #[test]
    fn test_delete_missing_keeps_version() {
        let store = RouteStore::default();
        store.put(def("a")).unwrap();
        assert_eq!(store.delete("nope").unwrap_err(), StoreError::NotFound("nope".into()));
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn test_put_is_idempotent_and_keeps_position() {
        let store = RouteStore::default();
        store.put(def("a")).unwrap();
        store.put(def("b")).unwrap();
        store.put(def("a").with_order(7)).unwrap();

        assert_eq!(ids(&store), vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().order, 7);
        assert_eq!(store.version(), 3);
    }

    #[test]
    fn test_reinsert_moves_last_or_inserts() {
        let base = RouteStore::default();
        base.put(def("a")).unwrap();
        base.put(def("b")).unwrap();
        let snapshot = base.snapshot();

        let moved = snapshot.with_reinserted(def("a"), DEFAULT_MAX_ROUTES).unwrap();
        let order: Vec<_> = moved.definitions().iter().map(|d| d.id.clone()).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(moved.version(), 3);

        let added = snapshot.with_reinserted(def("c"), DEFAULT_MAX_ROUTES).unwrap();
        assert_eq!(added.len(), 3);
        assert!(added.get("c").is_some());
    }

    #[test]
    fn test_replace_all() {
        let store = RouteStore::default();
        store.put(def("old")).unwrap();
        let before = store.snapshot();

        store.replace_all(vec![def("r1"), def("r2"), def("r1").with_order(2)]).unwrap();

        assert_eq!(ids(&store), vec!["r1", "r2"]);
        assert_eq!(store.get("r1").unwrap().order, 2);
        assert_eq!(store.version(), 2);
        // Old snapshot is untouched
        assert_eq!(before.len(), 1);
        assert!(before.get("old").is_some());
    }

    #[test]
    fn test_write_failures() {
        let store = RouteStore::new(1);
        assert_eq!(store.put(def(" ")).unwrap_err(), StoreError::InvalidId);
        store.put(def("a")).unwrap();
        assert_eq!(
            store.put(def("b")).unwrap_err(),
            StoreError::CapacityExceeded { limit: 1 }
        );
        // Replacing an existing id is always within capacity
        store.put(def("a")).unwrap();
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_install_detects_conflict() {
        let store = RouteStore::default();
        let base = store.snapshot();
        let staged = base.with_put(def("a"), 10).unwrap();

        store.put(def("b")).unwrap();
        assert_eq!(
            store.install(&base, staged).unwrap_err(),
            StoreError::Conflict { expected: 0, found: 1 }
        );
        assert_eq!(ids(&store), vec!["b"]);
    }
}
