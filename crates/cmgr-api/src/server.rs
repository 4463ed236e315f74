use std::path::Path;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::pidfile::PidFile;
use crate::routes::{AppState, router};

/// Bind `addr` and serve until Ctrl-C, SIGTERM, or `cancel` fires.
///
/// The PID file exists exactly while the listener is up. Shutdown cancels
/// `cancel`, which kills any subprocess an in-flight request is waiting on.
pub async fn serve(
    state: AppState,
    addr: &str,
    pid_file: &Path,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;
    let local = listener.local_addr()?;

    let _pid = PidFile::create(pid_file)?;
    info!(listen = %local, pid_file = %pid_file.display(), "Listening for requests");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .with_context(|| "HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on the first shutdown trigger, then cancels `cancel`.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = cancel.cancelled() => info!("Shutdown requested"),
    }
    cancel.cancel();
}
