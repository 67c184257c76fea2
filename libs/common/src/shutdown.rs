//! Shutdown signal handling

use tracing::{info, warn};

/// Resolve once the process is asked to stop.
///
/// Listens for Ctrl+C everywhere and additionally for SIGTERM on Unix. If the
/// SIGTERM handler cannot be installed only Ctrl+C is honoured.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("SIGTERM handler unavailable ({}), only Ctrl+C will stop the service", e);
                None
            },
        };

        let term_recv = async {
            match term.as_mut() {
                Some(sig) => {
                    sig.recv().await;
                },
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
            () = term_recv => info!("Received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler failed: {}", e);
        }
        info!("Received Ctrl+C");
    }
}
