//! Process signal handling.

use tokio_util::sync::CancellationToken;

/// Cancel `token` on the first SIGINT or SIGTERM.
///
/// Later signals are ignored while shutdown is in progress.
pub async fn cancel_on_signal(token: CancellationToken) {
    loop {
        let signal = wait_for_signal().await;
        if token.is_cancelled() {
            tracing::debug!(signal, "shutdown already in progress, ignoring signal");
        } else {
            tracing::info!(signal, "shutdown signal received");
            token.cancel();
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut interrupt, mut terminate) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
            _ => {
                tracing::warn!("failed to install unix signal handlers, falling back to Ctrl+C");
                return ctrl_c().await;
            }
        };

    tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
