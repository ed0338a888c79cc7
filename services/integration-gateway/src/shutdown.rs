//! Graceful shutdown: signal handling for the serve loop.

use tokio::signal;
use tracing::info;

/// Waits for SIGTERM or Ctrl+C.
///
/// Used as the server's graceful-shutdown trigger: in-flight requests are
/// allowed to drain (bounded by the inbound timeout layer) once the signal
/// fires.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            info!("Ctrl+C handler unavailable; relying on SIGTERM only");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
