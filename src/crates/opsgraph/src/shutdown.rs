//! Graceful shutdown handling
//!
//! SIGINT and SIGTERM cancel the active workflow run. The run still executes
//! `finalize`, so the caller gets a summary with status `failed`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shutdown coordinator for graceful termination
#[derive(Clone)]
pub struct ShutdownCoordinator {
    /// Flag indicating shutdown has been requested
    shutdown_requested: Arc<AtomicBool>,
    /// Cancelled when shutdown is requested; handed to workflow runs
    token: CancellationToken,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("shutdown_requested", &self.shutdown_requested.load(Ordering::SeqCst))
            .finish()
    }
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            token: CancellationToken::new(),
        }
    }

    /// Request shutdown
    pub fn request_shutdown(&self) {
        if !self.shutdown_requested.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested");
            self.token.cancel();
        }
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Token that fires on shutdown; pass it to `Orchestrator::run_with_cancel`
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Wait for shutdown signal
    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// Install signal handlers for SIGINT and SIGTERM
    ///
    /// This spawns a background task that listens for signals and calls request_shutdown()
    pub fn install_signal_handlers(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};

                let (mut sigint, mut sigterm) =
                    match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                        (Err(e), _) | (_, Err(e)) => {
                            warn!(error = %e, "Failed to install signal handlers");
                            return;
                        }
                    };

                tokio::select! {
                    _ = sigint.recv() => {
                        warn!("Received SIGINT, cancelling workflow...");
                        coordinator.request_shutdown();
                    }
                    _ = sigterm.recv() => {
                        warn!("Received SIGTERM, cancelling workflow...");
                        coordinator.request_shutdown();
                    }
                }
            }

            #[cfg(not(unix))]
            {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to install Ctrl+C handler");
                    return;
                }
                warn!("Received Ctrl+C, cancelling workflow...");
                coordinator.request_shutdown();
            }
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shutdown_coordinator_new() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutdown_requested());
        assert!(!coordinator.token().is_cancelled());
    }

    #[test]
    fn test_request_shutdown_cancels_tokens() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();

        coordinator.request_shutdown();
        assert!(coordinator.is_shutdown_requested());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_multiple_shutdown_requests() {
        let coordinator = ShutdownCoordinator::new();

        coordinator.request_shutdown();
        coordinator.request_shutdown();
        coordinator.request_shutdown();

        assert!(coordinator.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let coordinator_clone = coordinator.clone();

        let waiter = tokio::spawn(async move {
            coordinator_clone.wait_for_shutdown().await;
            "shutdown received"
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.request_shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), waiter).await;
        assert_eq!(result.unwrap().unwrap(), "shutdown received");
    }

    #[tokio::test]
    async fn test_wait_after_shutdown_returns_immediately() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.request_shutdown();

        let result = tokio::time::timeout(Duration::from_millis(50), coordinator.wait_for_shutdown()).await;
        assert!(result.is_ok());
    }
}
