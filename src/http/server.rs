//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the dispatch and admin Axum routers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Resolve every dispatch request against the active routing table
//! - Apply reloaded route lists and record refresh metrics
//! - Graceful shutdown of both listeners
//!
//! Forwarding is left to the proxy layer in front of the table: the dispatch
//! listener answers with the selected route.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::GatewayConfig;
use crate::http::request::{self, propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::shutdown::triggered;
use crate::observability::metrics;
use crate::routing::{FilterDefinition, RequestHead, RouteDefinition, RouteRegistry};

/// Response header naming the selected route.
pub const X_GATEWAY_ROUTE: &str = "x-gateway-route";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RouteRegistry>,
    pub api_key: Arc<str>,
}

/// The route chosen for a dispatch request.
#[derive(Debug, Serialize)]
pub struct RouteSelection {
    pub route_id: String,
    pub uri: String,
    pub order: i32,
    pub filters: Vec<FilterDefinition>,
    /// Version of the table the lookup ran against.
    pub version: u64,
}

/// HTTP server for the gateway: dispatch listener plus admin API.
pub struct HttpServer {
    router: Router,
    admin_router: Router,
    config: GatewayConfig,
    registry: Arc<RouteRegistry>,
}

impl HttpServer {
    pub fn new(config: GatewayConfig, registry: Arc<RouteRegistry>) -> Self {
        let state = AppState {
            registry: Arc::clone(&registry),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };

        let router = Self::build_router(&config, state.clone());
        let admin_router = Self::build_admin_router(&config, state);
        Self {
            router,
            admin_router,
            config,
            registry,
        }
    }

    /// Build the dispatch router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    #[allow(deprecated)]
    fn build_admin_router(config: &GatewayConfig, state: AppState) -> Router {
        setup_admin_router(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Dispatch router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn admin_router(&self) -> Router {
        self.admin_router.clone()
    }

    pub fn registry(&self) -> Arc<RouteRegistry> {
        Arc::clone(&self.registry)
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve until `shutdown` fires.
    ///
    /// `route_updates` carries reloaded route lists (e.g. from the config
    /// watcher); each is applied with `update_list`.
    pub async fn run(
        self,
        listener: TcpListener,
        admin_listener: Option<TcpListener>,
        route_updates: mpsc::UnboundedReceiver<Vec<RouteDefinition>>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Dispatch listener starting");

        let recorder = metrics::spawn_refresh_recorder(&self.registry);
        let updater = tokio::spawn(apply_route_updates(
            Arc::clone(&self.registry),
            route_updates,
            shutdown.resubscribe(),
        ));

        let admin_task = match admin_listener {
            Some(admin_listener) => {
                tracing::info!(address = %admin_listener.local_addr()?, "Admin API starting");
                let app = self.admin_router;
                let stop = shutdown.resubscribe();
                Some(tokio::spawn(async move {
                    axum::serve(admin_listener, app)
                        .with_graceful_shutdown(triggered(stop))
                        .await
                }))
            }
            None => None,
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(triggered(shutdown))
            .await?;

        if let Some(task) = admin_task {
            match task.await {
                Ok(result) => result?,
                Err(e) => tracing::error!(error = %e, "Admin server task failed"),
            }
        }

        updater.abort();
        recorder.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn apply_route_updates(
    registry: Arc<RouteRegistry>,
    mut updates: mpsc::UnboundedReceiver<Vec<RouteDefinition>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(routes) => {
                    if let Err(e) = registry.update_list(routes) {
                        tracing::warn!(error = %e, "Reloaded routes rejected; keeping current table");
                    }
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Resolve the request against the active table.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request::request_id(&request);
    let table = state.registry.active_table();

    match table.resolve(&RequestHead::from_request(&request)) {
        Some(route) => {
            metrics::record_resolution(true);
            tracing::debug!(
                request_id = %request_id,
                method = %request.method(),
                path = %request.uri().path(),
                route_id = %route.id,
                version = table.version(),
                "Route selected"
            );
            let selection = RouteSelection {
                route_id: route.id.clone(),
                uri: route.target_uri.clone(),
                order: route.order,
                filters: route.filters.clone(),
                version: table.version(),
            };
            ([(X_GATEWAY_ROUTE, route.id.clone())], Json(selection)).into_response()
        }
        None => {
            metrics::record_resolution(false);
            tracing::warn!(request_id = %request_id, path = %request.uri().path(), "No route matched");
            (StatusCode::NOT_FOUND, "No matching route found").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::PredicateDefinition;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let registry = Arc::new(RouteRegistry::default());
        registry
            .add(
                RouteDefinition::new("r1", "lb://nacos-consumer")
                    .with_predicate(PredicateDefinition::shortcut("PathPrefix=/consumer")),
            )
            .unwrap();
        HttpServer::new(GatewayConfig::default(), registry)
    }

    #[tokio::test]
    async fn test_dispatch_selects_route() {
        let app = server().router();
        let res = app
            .oneshot(Request::get("/consumer/sayHello/Tom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[X_GATEWAY_ROUTE], "r1");
        assert!(res.headers().contains_key(request::X_REQUEST_ID));

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["route_id"], "r1");
        assert_eq!(json["uri"], "lb://nacos-consumer");
        assert_eq!(json["version"], 1);
    }

    #[tokio::test]
    async fn test_dispatch_no_match() {
        let app = server().router();
        let res = app
            .oneshot(
                Request::get("/elsewhere")
                    .header(request::X_REQUEST_ID, "req-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()[request::X_REQUEST_ID], "req-1");
    }
}
