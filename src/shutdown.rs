//! Process signal handling
//!
//! Turns SIGINT/SIGTERM (Ctrl-C off unix) into a cancellation of the server's shutdown token.

use std::{future::Future, io};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Listens for shutdown signals, and cancels `shutdown` if one is received.
///
/// If the handlers cannot be installed the token is cancelled as well and the error returned, so
/// the server never keeps running without a way to stop it. Returns `Ok` early if the token is
/// cancelled elsewhere first.
pub async fn listen_for_shutdown_signals(shutdown: CancellationToken) -> io::Result<()> {
    cancel_on_signal(shutdown, wait_for_signal()).await
}

async fn cancel_on_signal<F>(shutdown: CancellationToken, signal: F) -> io::Result<()>
where
    F: Future<Output = io::Result<&'static str>>,
{
    let received = tokio::select! {
        signal = signal => signal,
        () = shutdown.cancelled() => return Ok(()),
    };
    shutdown.cancel();

    match received {
        Ok(signal) => {
            info!(signal, "shutdown signal received");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "failed to install shutdown signal handlers");
            Err(err)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
