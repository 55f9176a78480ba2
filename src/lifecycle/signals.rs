//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT/SIGTERM or an internal shutdown request
//! - Report which one arrived so the caller can log it

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupt,
    Terminate,
    Requested,
}

/// Resolve on the first of Ctrl+C, SIGTERM (unix) or a shutdown trigger.
pub async fn wait_for_stop(mut requested: broadcast::Receiver<()>) -> StopReason {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let reason = tokio::select! {
        _ = interrupt => StopReason::Interrupt,
        _ = terminate => StopReason::Terminate,
        _ = requested.recv() => StopReason::Requested,
    };
    tracing::info!(reason = ?reason, "Shutdown signal received");
    reason
}
