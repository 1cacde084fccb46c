//! Graceful shutdown on SIGINT / SIGTERM.

use std::{future::Future, io};

use tokio::signal;

/// Resolves once the process has been asked to stop.
pub async fn shutdown_signal() {
    let ctrl_c = wait_for_ctrl_c(signal::ctrl_c());

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// A listener that fails to install never resolves.
async fn wait_for_ctrl_c(listener: impl Future<Output = io::Result<()>>) {
    match listener.await {
        Ok(()) => tracing::info!("Received SIGINT, starting graceful shutdown..."),
        Err(e) => {
            tracing::error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
