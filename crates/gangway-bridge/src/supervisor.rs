//! Supervision: startup readiness, the resync ticker, and the event
//! loop's reconnect policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use gangway_core::RegistryAdapter;

use crate::bridge::Bridge;

/// Pause between startup retries and event-loop reconnects.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Drives the bridge for the lifetime of the process.
pub struct Supervisor {
    bridge: Arc<Bridge>,
    registry: Arc<dyn RegistryAdapter>,
    resync_interval: Duration,
}

impl Supervisor {
    pub fn new(
        bridge: Arc<Bridge>,
        registry: Arc<dyn RegistryAdapter>,
        resync_interval: Duration,
    ) -> Self {
        Supervisor {
            bridge,
            registry,
            resync_interval,
        }
    }

    /// Run until the scheduler event channel closes.
    ///
    /// Startup blocks on registry readiness and one successful full
    /// sync. After that the resync ticker and the event loop run
    /// concurrently; the ticker never stops on errors, the event loop
    /// re-subscribes on failure.
    pub async fn run(&self) {
        loop {
            match self.registry.ping().await {
                Ok(()) => {
                    info!("registry agent reachable");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?RETRY_INTERVAL, "registry agent not ready");
                    sleep(RETRY_INTERVAL).await;
                }
            }
        }

        info!("performing initial sync");
        loop {
            match self.bridge.sync().await {
                Ok(_) => break,
                Err(e) => {
                    error!(error = %e, retry_in = ?RETRY_INTERVAL, "initial sync failed");
                    sleep(RETRY_INTERVAL).await;
                }
            }
        }

        let (quit_tx, mut quit_rx) = watch::channel(false);
        let bridge = self.bridge.clone();
        let interval = self.resync_interval;
        let ticker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(interval) => {
                        if let Err(e) = bridge.sync().await {
                            error!(error = %e, "resync failed");
                        }
                    }
                    _ = quit_rx.changed() => break,
                }
            }
        });

        loop {
            match self.bridge.process_events().await {
                Ok(()) => break,
                Err(e) => {
                    error!(error = %e, retry_in = ?RETRY_INTERVAL, "event subscription failed");
                    sleep(RETRY_INTERVAL).await;
                }
            }
        }

        warn!("scheduler event loop closed, shutting down");
        let _ = quit_tx.send(true);
        let _ = ticker.await;
    }
}
