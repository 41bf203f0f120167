//! Refresh notifications.
//!
//! # Responsibilities
//! - Announce that a new compiled table is active, with its version
//! - Fan out to any number of listeners (connection warmers, metrics)
//!
//! # Design Decisions
//! - Backed by a tokio broadcast channel: `publish` never blocks and never
//!   fails the mutation that triggered it
//! - Per-subscriber delivery follows publish order, which the registry keeps
//!   equal to version order
//! - A subscriber that falls behind skips to the newest events and is told
//!   how many it missed (`RecvError::Lagged`)

use serde::Serialize;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_REFRESH_CAPACITY: usize = 64;

/// "The active table changed."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshEvent {
    /// Store version the active table was compiled from.
    pub version: u64,
    /// Number of routes in the active table.
    pub routes: usize,
}

/// Single-writer, multi-reader refresh channel.
#[derive(Debug, Clone)]
pub struct RefreshBus {
    tx: broadcast::Sender<RefreshEvent>,
}

impl RefreshBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver `event` to current subscribers. Returns how many received it.
    pub fn publish(&self, event: RefreshEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!(version = event.version, "Refresh published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_CAPACITY)
    }
}
