use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on the first SIGINT or SIGTERM.
pub async fn wait_for_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        ag_info!(sys, signal = "SIGINT", "received signal, initiating graceful shutdown");
                    }
                    _ = sigterm.recv() => {
                        ag_info!(sys, signal = "SIGTERM", "received signal, initiating graceful shutdown");
                    }
                }
            }
            Err(e) => {
                ag_warn!(sys, error = %e, "SIGTERM handler unavailable, waiting for Ctrl-C only");
                wait_ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    wait_ctrl_c().await;
    cancel.cancel();
}

async fn wait_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => ag_info!(sys, signal = "SIGINT", "received signal, initiating graceful shutdown"),
        Err(e) => ag_error!(sys, error = %e, "Ctrl-C handler unavailable, shutting down"),
    }
}
