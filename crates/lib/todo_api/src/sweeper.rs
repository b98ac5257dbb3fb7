//! Periodic removal of expired refresh tokens.
//!
//! Runs on its own timer, independent of request handling.

use std::sync::Arc;
use std::time::Duration;

use todo_core::auth::AuthError;
use todo_core::auth::service::AuthService;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn the sweeper. It stops when `cancel` fires.
pub fn start(
    auth: Arc<AuthService>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_loop(auth, interval, cancel).await;
    })
}

async fn run_loop(auth: Arc<AuthService>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(?interval, "session sweeper started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = cancel.cancelled() => {
                tracing::info!("session sweeper shutting down");
                return;
            }
        }

        if let Err(e) = sweep_once(&auth).await {
            tracing::error!(error = %e, "session sweep failed");
        }
    }
}

/// Run a single sweep pass, returning the number of removed sessions.
pub async fn sweep_once(auth: &AuthService) -> Result<u64, AuthError> {
    let removed = auth.cleanup_expired_tokens().await?;
    if removed > 0 {
        tracing::info!(removed, "expired sessions removed");
    }
    Ok(removed)
}
