use tokio::signal;
use tracing::{event, Level};

/// Resolves on the first of SIGINT, SIGTERM or SIGQUIT.
#[cfg(target_family = "unix")]
pub async fn signal_for_shutdown() {
    use signal::unix::{signal as unix_signal, SignalKind};

    let signals = (
        unix_signal(SignalKind::interrupt()),
        unix_signal(SignalKind::terminate()),
        unix_signal(SignalKind::quit()),
    );
    match signals {
        (Ok(mut interrupt), Ok(mut terminate), Ok(mut quit)) => {
            tokio::select! {
                _ = interrupt.recv() => (),
                _ = terminate.recv() => (),
                _ = quit.recv() => (),
            }
        }
        _ => {
            event!(Level::WARN, "could not install unix signal handlers, waiting for ctrl-c");
            signal::ctrl_c().await.ok();
        }
    }
    event!(Level::INFO, "shutdown signal received");
}

#[cfg(not(target_family = "unix"))]
pub async fn signal_for_shutdown() {
    signal::ctrl_c().await.ok();
    event!(Level::INFO, "shutdown signal received");
}
