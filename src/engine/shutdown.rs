use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Bridges process signals into cancellation. The daemon is stopped through
/// SIGTERM by `wordwatch stop`, and buffered deltas must still be flushed on
/// that path, so termination is caught here instead of killing the process.
///
/// On Windows detached processes can't detect signals sent to them, so this
/// should be enhanced in the future to support another way of sending
/// signals.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                select! {
                    _ = tokio::signal::ctrl_c() => info!("Received ctrl-c"),
                    _ = terminate.recv() => info!("Received SIGTERM"),
                };
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received ctrl-c");
    }
    cancelation.cancel();
}
