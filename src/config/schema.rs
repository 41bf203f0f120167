//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::bus::DEFAULT_REFRESH_CAPACITY;
use crate::routing::definition::RouteDefinition;
use crate::routing::store::DEFAULT_MAX_ROUTES;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Dispatch listener configuration.
    pub listener: ListenerConfig,

    /// Administrative API settings.
    pub admin: AdminConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Route registry limits.
    pub registry: RegistryConfig,

    /// Routes installed at startup (and on reload).
    pub routes: Vec<RouteDefinition>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request timeout on both listeners, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Route registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of routes the store accepts.
    pub max_routes: usize,

    /// Refresh events buffered per subscriber before it starts lagging.
    pub refresh_channel_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_routes: DEFAULT_MAX_ROUTES,
            refresh_channel_capacity: DEFAULT_REFRESH_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.admin.enabled);
        assert_eq!(config.registry.max_routes, DEFAULT_MAX_ROUTES);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_routes_from_toml() {
        let toml = r#"
            [registry]
            max_routes = 50

            [[routes]]
            id = "consumer"
            uri = "lb://nacos-consumer"
            predicates = ["Path=/consumer/**"]
            filters = ["StripPrefix=1"]

            [[routes]]
            id = "provider"
            uri = "lb://nacos-provider"
            order = -1
            predicates = [{ name = "Header", args = { header = "X-Env", value = "canary" } }]
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.registry.max_routes, 50);
        assert_eq!(config.registry.refresh_channel_capacity, DEFAULT_REFRESH_CAPACITY);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].predicates[0].positional(), vec!["/consumer/**"]);
        assert_eq!(config.routes[1].order, -1);
        assert_eq!(config.routes[1].predicates[0].arg(&["header"]), Some("X-Env"));
    }
}
