//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use dynamic_gateway::config::GatewayConfig;
use dynamic_gateway::routing::{PredicateDefinition, RouteDefinition, RouteRegistry};
use dynamic_gateway::{HttpServer, Shutdown};

pub const TEST_API_KEY: &str = "test-admin-key";

/// A running gateway bound to ephemeral ports.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub registry: Arc<RouteRegistry>,
    pub route_updates: mpsc::UnboundedSender<Vec<RouteDefinition>>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn admin_url(&self) -> String {
        format!("http://{}", self.admin_addr)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Start the dispatch and admin listeners on port 0.
pub async fn start_gateway(routes: Vec<RouteDefinition>) -> TestGateway {
    let mut config = GatewayConfig::default();
    config.admin.api_key = TEST_API_KEY.to_string();
    config.routes = routes;

    let registry = dynamic_gateway::lifecycle::startup::build_registry(&config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, Arc::clone(&registry));
    let handle = tokio::spawn(server.run(listener, Some(admin_listener), rx, shutdown.subscribe()));

    TestGateway {
        addr,
        admin_addr,
        registry,
        route_updates: tx,
        shutdown,
        handle,
    }
}

/// Route matching everything under `prefix`.
pub fn prefix_route(id: &str, prefix: &str, uri: &str) -> RouteDefinition {
    RouteDefinition::new(id, uri)
        .with_predicate(PredicateDefinition::shortcut(&format!("Path={}/**", prefix)))
}

/// Wait until `check` holds or the deadline passes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
