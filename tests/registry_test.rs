//! Registry behavior under concurrent readers and writers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use axum::http::Request;
use dynamic_gateway::routing::{PredicateDefinition, RequestHead, RouteDefinition, RouteRegistry};

mod common;

fn get(path: &str) -> Request<()> {
    Request::get(path).body(()).unwrap()
}

#[test]
fn test_readers_never_see_partial_update() {
    // Both generations agree on every path; a torn table would mix them.
    let generation = |tag: &str| {
        vec![
            common::prefix_route("a", "/a", &format!("http://{}-a", tag)),
            common::prefix_route("b", "/b", &format!("http://{}-b", tag)),
        ]
    };

    let registry = Arc::new(RouteRegistry::default());
    registry.update_list(generation("old")).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checks = 0u64;
                loop {
                    let table = registry.active_table();
                    let (req_a, req_b) = (get("/a/x"), get("/b/x"));
                    let a = table.resolve(&RequestHead::from_request(&req_a)).unwrap();
                    let b = table.resolve(&RequestHead::from_request(&req_b)).unwrap();
                    let tag_a = a.target_uri.trim_end_matches("-a");
                    let tag_b = b.target_uri.trim_end_matches("-b");
                    assert_eq!(tag_a, tag_b, "mixed table at version {}", table.version());
                    checks += 1;
                    if done.load(Ordering::Relaxed) {
                        break;
                    }
                }
                checks
            })
        })
        .collect();

    for i in 0..200 {
        let tag = if i % 2 == 0 { "new" } else { "old" };
        registry.update_list(generation(tag)).unwrap();
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(registry.version(), 201);
}

#[test]
fn test_concurrent_writers_are_serialized() {
    let registry = Arc::new(RouteRegistry::default());
    let writers: Vec<_> = (0..8)
        .map(|w| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..25 {
                    let id = format!("w{}-{}", w, i);
                    registry
                        .add(common::prefix_route(&id, &format!("/{}", id), "http://backend"))
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(registry.version(), 200);
    assert_eq!(registry.list_all().len(), 200);
    assert_eq!(registry.active_table().len(), 200);
    assert!(registry.resolve(&get("/w3-7/anything")).is_some());
}

#[test]
fn test_refresh_events_have_increasing_versions() {
    let registry = RouteRegistry::default();
    let mut rx = registry.subscribe();

    registry.add(common::prefix_route("a", "/a", "http://a")).unwrap();
    registry.add(common::prefix_route("b", "/b", "http://b")).unwrap();
    registry.delete("a").unwrap();

    let versions: Vec<u64> = (0..3).map(|_| rx.try_recv().unwrap().version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[test]
fn test_failed_mutation_changes_nothing() {
    let registry = RouteRegistry::default();
    registry.add(common::prefix_route("good", "/good", "http://good")).unwrap();
    let mut rx = registry.subscribe();

    let err = registry
        .update_list(vec![
            common::prefix_route("ok", "/ok", "http://ok"),
            RouteDefinition::new("bad", "http://bad")
                .with_predicate(PredicateDefinition::shortcut("Weekday=Mon")),
        ])
        .unwrap_err();

    assert_eq!(err.to_string(), "compile failed: bad");
    assert_eq!(registry.version(), 1);
    assert_eq!(registry.list_all().len(), 1);
    assert!(registry.resolve(&get("/good/x")).is_some());
    assert!(registry.resolve(&get("/ok/x")).is_none());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_order_then_insertion_decides_ties() {
    let registry = RouteRegistry::default();
    registry
        .update_list(vec![
            common::prefix_route("first", "/api", "http://first"),
            common::prefix_route("second", "/api", "http://second"),
            common::prefix_route("preferred", "/api", "http://preferred").with_order(-1),
        ])
        .unwrap();

    assert_eq!(registry.resolve(&get("/api/v1")).unwrap().id, "preferred");
    registry.delete("preferred").unwrap();
    assert_eq!(registry.resolve(&get("/api/v1")).unwrap().id, "first");
}
