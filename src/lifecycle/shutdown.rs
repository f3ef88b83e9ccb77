//! Signal handling for graceful shutdown

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Handles shutdown signals (SIGTERM, SIGINT) and in-process quit requests
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<Notify>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown from inside the process (IPC `quit`)
    pub fn trigger(&self) {
        // notify_one keeps a permit if nobody is waiting yet
        self.requested.notify_one();
    }

    /// Wait for a shutdown signal or a quit request
    pub async fn wait(&self) {
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        debug!("received SIGTERM");
                    }
                    _ = sigint.recv() => {
                        debug!("received SIGINT");
                    }
                    _ = self.requested.notified() => {
                        debug!("quit requested");
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(?e, "failed to register signal handlers, only quit requests will stop the daemon");
                self.requested.notified().await;
                debug!("quit requested");
            }
        }
    }
}
