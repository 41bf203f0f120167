//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_route_mutations_total` (counter): admin mutations by op, result
//! - `gateway_table_refreshes_total` (counter): tables installed
//! - `gateway_active_routes` (gauge): routes in the active table
//! - `gateway_table_version` (gauge): store version of the active table
//! - `gateway_resolutions_total` (counter): dispatch lookups by result
//!
//! # Design Decisions
//! - Refresh metrics come from a RefreshBus subscriber, not the write path
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::routing::bus::RefreshEvent;
use crate::routing::registry::RouteRegistry;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_mutation(op: &'static str, result: &'static str) {
    counter!("gateway_route_mutations_total", "op" => op, "result" => result).increment(1);
}

pub fn record_refresh(event: &RefreshEvent) {
    counter!("gateway_table_refreshes_total").increment(1);
    record_table(event);
}

fn record_table(event: &RefreshEvent) {
    gauge!("gateway_active_routes").set(event.routes as f64);
    gauge!("gateway_table_version").set(event.version as f64);
}

pub fn record_resolution(matched: bool) {
    let result = if matched { "matched" } else { "no_match" };
    counter!("gateway_resolutions_total", "result" => result).increment(1);
}

/// Set the table gauges from the registry's active table, then record every
/// refresh published on its bus until it closes.
///
/// Tables installed before this call (e.g. startup routes) were published
/// before the subscription existed, so the gauges are seeded directly.
pub fn spawn_refresh_recorder(registry: &RouteRegistry) -> JoinHandle<()> {
    let events = registry.subscribe();
    let table = registry.active_table();
    record_table(&RefreshEvent {
        version: table.version(),
        routes: table.len(),
    });
    forward_refreshes(events)
}

fn forward_refreshes(mut events: broadcast::Receiver<RefreshEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => record_refresh(&event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Refresh recorder lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{PredicateDefinition, RouteDefinition};

    fn gauge_value(rendered: &str, name: &str) -> Option<f64> {
        rendered
            .lines()
            .find(|line| line.split_whitespace().next() == Some(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|value| value.parse().ok())
    }

    #[tokio::test]
    async fn test_recorder_seeds_gauges_from_active_table() {
        let registry = RouteRegistry::default();
        registry
            .update_list(vec![
                RouteDefinition::new("a", "lb://a")
                    .with_predicate(PredicateDefinition::shortcut("Path=/a/**")),
                RouteDefinition::new("b", "lb://b")
                    .with_predicate(PredicateDefinition::shortcut("Path=/b/**")),
            ])
            .unwrap();

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let task = ::metrics::with_local_recorder(&recorder, || spawn_refresh_recorder(&registry));
        task.abort();

        let rendered = handle.render();
        assert_eq!(gauge_value(&rendered, "gateway_active_routes"), Some(2.0));
        assert_eq!(gauge_value(&rendered, "gateway_table_version"), Some(1.0));
    }
}
