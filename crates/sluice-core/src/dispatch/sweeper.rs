//! Background purge of expired archived records.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Dispatcher;

/// Calls [`Dispatcher::purge_archive`] every `interval` until shut down.
///
/// # Flow
/// 1. sleep one interval (or wake on shutdown)
/// 2. purge records completed before `now - max_age`
/// 3. repeat
pub struct ArchiveSweeper {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ArchiveSweeper {
    /// Sweep at the configured `archive.sweep_interval_ms`.
    pub fn spawn(dispatcher: &Dispatcher) -> Self {
        let interval = dispatcher.config().archive.sweep_interval();
        Self::spawn_every(dispatcher, interval)
    }

    pub fn spawn_every(dispatcher: &Dispatcher, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let dispatcher = dispatcher.clone();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let evicted = dispatcher.purge_archive().await;
                        debug!(evicted, "archive sweep");
                    }
                }
            }
        });

        Self { shutdown_tx, join }
    }

    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}
