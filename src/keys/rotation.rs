//! Scheduled signing key rotation.

use crate::keys::manager::SigningKeyManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Handle to a running rotation task.
pub struct RotationScheduler {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RotationScheduler {
    /// Spawn a task that rotates `manager` every `every`.
    ///
    /// The first rotation happens one full interval after start.
    #[must_use]
    pub fn spawn(manager: Arc<SigningKeyManager>, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = every.as_secs(), "Key rotation scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = manager.rotate() {
                            error!(error = %e, "Scheduled key rotation failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Key rotation scheduler stopped");
        });

        Self { shutdown_tx, task }
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
