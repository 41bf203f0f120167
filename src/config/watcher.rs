//! Configuration file watcher for hot route reload.
//!
//! The watcher is one more external writer: every valid reload pushes the
//! file's `routes` through `update_list`. Invalid files are logged and the
//! current table keeps serving.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::routing::definition::RouteDefinition;

/// A watcher that monitors the configuration file for route changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<Vec<RouteDefinition>>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for reloaded route lists.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<Vec<RouteDefinition>>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. Keep the returned watcher alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(config) => {
                            tracing::info!(
                                path = ?path,
                                routes = config.routes.len(),
                                "Config file changed, reloading routes"
                            );
                            if tx.send(config.routes).is_err() {
                                tracing::debug!("Route update receiver closed");
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config. Keeping current routes.");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
