//! Background eviction of idle sessions.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::store::SessionStore;

/// Periodically removes sessions idle for longer than the store's TTL.
pub struct SessionJanitor {
    store: Arc<SessionStore>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl SessionJanitor {
    pub fn new(store: Arc<SessionStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Janitor using the store's configured cleanup interval.
    pub fn for_store(store: Arc<SessionStore>) -> Self {
        let interval = Duration::from_secs(store.config().cleanup_interval_secs.max(1));
        Self::new(store, interval)
    }

    /// Run the eviction loop until [`SessionJanitor::shutdown`] is called.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.store.evict_expired();
                    if removed > 0 {
                        info!(
                            removed,
                            remaining = self.store.session_count(),
                            "Evicted idle sessions"
                        );
                    } else {
                        debug!("No idle sessions to evict");
                    }
                }
                _ = self.shutdown.notified() => {
                    debug!("Session janitor stopping");
                    return;
                }
            }
        }
    }

    /// Signal the loop to exit.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Spawn the loop onto the current runtime.
    pub fn spawn(self) -> JanitorHandle {
        let janitor = Arc::new(self);
        let task = {
            let janitor = Arc::clone(&janitor);
            tokio::spawn(async move { janitor.run().await })
        };
        info!(interval_secs = janitor.interval.as_secs(), "Session janitor started");
        JanitorHandle { janitor, task }
    }
}

/// Owner of a spawned janitor; stop it explicitly at shutdown.
pub struct JanitorHandle {
    janitor: Arc<SessionJanitor>,
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Signal shutdown and wait for the loop to finish.
    pub async fn stop(self) {
        self.janitor.shutdown();
        if let Err(e) = self.task.await {
            tracing::warn!("Session janitor task failed: {}", e);
        }
        info!("Session janitor stopped");
    }
}
