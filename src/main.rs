//! Dynamic Route Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  DYNAMIC GATEWAY                  │
//!                         │                                                   │
//!   Admin caller          │  ┌─────────┐   ┌──────────────┐   ┌───────────┐  │
//!   ──────────────────────┼─▶│  admin  │──▶│   registry   │──▶│   store   │  │
//!   (POST/PUT/DELETE)     │  │   API   │   │ (one writer) │   │ (CoW map) │  │
//!                         │  └─────────┘   └──────┬───────┘   └───────────┘  │
//!   Config file ──watch───┼───────────────────────┤                          │
//!                         │                       ▼ compile                  │
//!                         │               ┌──────────────┐   ┌───────────┐  │
//!                         │               │ active table │──▶│  refresh  │──┼──▶ listeners
//!                         │               │  (ArcSwap)   │   │    bus    │  │    (metrics)
//!                         │               └──────▲───────┘   └───────────┘  │
//!   Client request        │  ┌─────────┐          │ resolve                   │
//!   ──────────────────────┼─▶│dispatch │──────────┘                           │
//!                         │  └─────────┘                                      │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use dynamic_gateway::config::{load_config, watcher::ConfigWatcher, GatewayConfig};
use dynamic_gateway::lifecycle::{signals, startup, Shutdown};
use dynamic_gateway::observability::{logging, metrics};
use dynamic_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "dynamic-gateway")]
#[command(about = "API gateway with runtime-updatable routes", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload routes whenever the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("dynamic-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        admin_enabled = config.admin.enabled,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = startup::build_registry(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    // The watcher must outlive the server.
    let (_watcher, route_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry);
    let mut server_task = tokio::spawn(server.run(
        listener,
        admin_listener,
        route_updates,
        shutdown.subscribe(),
    ));

    tokio::select! {
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            server_task.await??;
        }
        result = &mut server_task => result??,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
