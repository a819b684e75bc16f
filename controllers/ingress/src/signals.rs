//! OS shutdown signals.

use crate::stop::StopSignal;
use tracing::{error, info, warn};

/// Wait for the next SIGINT or SIGTERM and return its name.
async fn next_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "SIGINT")
    }
}

/// Fire `stop` on the first shutdown signal and log any later ones.
///
/// Runs until the task is aborted. If the handler cannot be installed the
/// process could never be stopped, so `stop` is fired instead.
pub async fn forward_shutdown_signals(stop: StopSignal) {
    while on_signal(&stop, next_signal().await) {}
}

/// Record one signal wait outcome. Returns false once listening must end.
pub(crate) fn on_signal(stop: &StopSignal, received: std::io::Result<&'static str>) -> bool {
    match received {
        Ok(name) => {
            if stop.fire() {
                info!(signal = name, "Received {}, shutting down", name);
            } else {
                warn!(signal = name, "Received {} while already shutting down", name);
            }
            true
        }
        Err(e) => {
            error!("Failed to install shutdown signal handler, shutting down: {}", e);
            stop.fire();
            false
        }
    }
}
