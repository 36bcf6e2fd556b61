use anyhow::Result;
use tokio::signal;

/// Resolve once Ctrl+C or SIGTERM arrives.
pub async fn wait_for_shutdown() -> Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let terminate = terminate.recv();
    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, initiating graceful shutdown");
    Ok(())
}

/// Variant for `axum::serve(..).with_graceful_shutdown`, which wants `()`.
pub async fn shutdown_signal() {
    if let Err(e) = wait_for_shutdown().await {
        tracing::error!(error = %e, "Signal handling failed; shutting down");
    }
}
