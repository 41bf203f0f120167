//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: initial routes that do not compile abort startup
//! - The registry starts empty and receives config routes as one update_list

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::routing::{RegistryError, RouteRegistry};

/// Build the registry and install the configured routes.
pub fn build_registry(config: &GatewayConfig) -> Result<Arc<RouteRegistry>, RegistryError> {
    let registry = RouteRegistry::from_config(&config.registry);

    if !config.routes.is_empty() {
        let event = registry.update_list(config.routes.clone())?;
        tracing::info!(
            routes = event.routes,
            version = event.version,
            "Initial routes installed"
        );
    }

    Ok(Arc::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{PredicateDefinition, RouteDefinition};

    #[test]
    fn test_seeds_config_routes() {
        let mut config = GatewayConfig::default();
        config.routes.push(
            RouteDefinition::new("r1", "lb://nacos-consumer")
                .with_predicate(PredicateDefinition::shortcut("Path=/consumer/**")),
        );
        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.version(), 1);
        assert_eq!(registry.active_table().len(), 1);
    }

    #[test]
    fn test_bad_initial_route_fails() {
        let mut config = GatewayConfig::default();
        config.routes.push(
            RouteDefinition::new("broken", "lb://x")
                .with_predicate(PredicateDefinition::shortcut("Nope=1")),
        );
        let err = build_registry(&config).unwrap_err();
        assert_eq!(err.to_string(), "compile failed: broken");
    }

    #[test]
    fn test_empty_config_starts_at_version_zero() {
        let registry = build_registry(&GatewayConfig::default()).unwrap();
        assert_eq!(registry.version(), 0);
        assert!(registry.list_all().is_empty());
    }
}
