//! Periodic cleanup task

use crate::manager::SessionManager;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Runs [`SessionManager::cleanup`] on a fixed interval until shut down or dropped
pub struct CleanupScheduler {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CleanupScheduler {
    /// Spawn the cleanup loop. The first pass runs after one full interval.
    pub fn start(manager: SessionManager, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            info!(interval_secs = interval.as_secs(), "Session cleanup scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match manager.cleanup().await {
                            Ok(0) => debug!("Scheduled cleanup reaped nothing"),
                            Ok(reaped) => info!(reaped, "Scheduled cleanup reaped sessions"),
                            Err(e) => error!(error = %e, "Scheduled cleanup failed"),
                        }
                    }
                    _ = &mut shutdown_rx => {
                        info!("Session cleanup scheduler stopped");
                        break;
                    }
                }
            }
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Stop the loop and wait for an in-flight pass to finish
    pub async fn shutdown(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Cleanup scheduler task failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}
