//! Background key-expiry sweeper.
//!
//! Periodically calls `KeyVault::sweep_expired` until shut down. Each pass
//! only takes per-record locks in the key repository, so foreground signing
//! is never blocked for longer than one status update.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notary_contracts::error::NotaryResult;
use notary_vault::KeyVault;

/// Expires due vault keys on a fixed interval.
pub struct ExpirySweeper {
    vault: Arc<KeyVault>,
    interval: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper over `vault`. Nothing runs until `run` is awaited.
    pub fn new(vault: Arc<KeyVault>, interval: Duration) -> Self {
        Self { vault, interval }
    }

    /// Run a single pass now. Returns how many keys it expired.
    pub fn sweep_once(&self) -> NotaryResult<usize> {
        self.vault.sweep_expired(Utc::now())
    }

    /// Sweep immediately, then once per interval, until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Expiry sweeper started"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Expiry sweeper shutting down");
                break;
            }

            let vault = Arc::clone(&self.vault);
            match tokio::task::spawn_blocking(move || vault.sweep_expired(Utc::now())).await {
                Ok(Ok(0)) => debug!("Expiry sweeper: nothing due"),
                Ok(Ok(count)) => info!(count, "Expiry sweeper: keys expired"),
                Ok(Err(e)) => warn!(error = %e, "Expiry sweeper: pass failed"),
                Err(e) => warn!(error = %e, "Expiry sweeper: pass aborted"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Expiry sweeper shutting down");
                    break;
                }
            }
        }
    }
}
