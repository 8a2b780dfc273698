//! Echo server lifecycle
//!
//! Binds the listener, runs the accept loop on its own task, and tears it down on request.

use std::{net::SocketAddr, time::Duration};

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use tokio::{
    net::{TcpListener, TcpStream},
    task::{JoinError, JoinHandle, JoinSet},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{build_app, config::Config, errors::ServerError, AppState};

/// Pause after a failed accept, e.g. when the process is out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Handle to a running server.
///
/// The server is running from a successful [`EchoServer::start`] until [`EchoServer::stop`] or
/// [`EchoServer::wait`] returns. Dropping the handle cancels the serve loop without waiting for it.
pub struct EchoServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl EchoServer {
    /// Binds the configured address and starts serving in the background.
    ///
    /// Bind failures are returned here; the server is accepting connections once this returns.
    pub async fn start(config: &Config) -> Result<Self, ServerError> {
        let addr = config.bind_socket()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let app = build_app(AppState::new(config.max_body_bytes));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve(
            listener,
            app,
            shutdown.clone(),
            config.shutdown_timeout,
        ));

        info!(local_addr = %local_addr, "server listening");

        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The cooperative interruption signal; cancelling it stops the serve loop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.task.is_finished()
    }

    /// Stops accepting connections and waits for in-flight requests to drain.
    ///
    /// Connections still open after the shutdown timeout are closed without a response. When this
    /// returns, the listening socket and every connection are released.
    pub async fn stop(mut self) -> Result<(), ServerError> {
        self.shutdown.cancel();
        let result = (&mut self.task).await.map_err(ServerError::Task);

        info!(local_addr = %self.local_addr, "server stopped");
        result
    }

    /// Serves until the shutdown token is cancelled, then stops.
    ///
    /// Also returns if the serve loop ends on its own.
    pub async fn wait(mut self) -> Result<(), ServerError> {
        let finished = tokio::select! {
            () = self.shutdown.cancelled() => None,
            joined = &mut self.task => Some(joined),
        };

        match finished {
            None => self.stop().await,
            Some(joined) => {
                self.shutdown.cancel();
                joined.map_err(ServerError::Task)
            }
        }
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Accept loop. Each connection runs in `connections` so shutdown can drain and then abort them.
async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    drain_timeout: Duration,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                log_connection_exit(joined);
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!(peer = %peer, "connection accepted");
                    connections.spawn(serve_connection(stream, app.clone(), shutdown.clone()));
                }
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    drop(listener);

    if time::timeout(drain_timeout, drain(&mut connections))
        .await
        .is_err()
    {
        warn!(
            open_connections = connections.len(),
            timeout_ms = drain_timeout.as_millis(),
            "graceful shutdown timed out, aborting connections"
        );
        connections.abort_all();
        drain(&mut connections).await;
    }
}

async fn serve_connection(stream: TcpStream, app: Router, shutdown: CancellationToken) {
    let conn = http1::Builder::new().serve_connection(
        TokioIo::new(stream),
        TowerToHyperService::new(app),
    );
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(err) = result {
        debug!(error = %err, "connection closed with error");
    }
}

async fn drain(connections: &mut JoinSet<()>) {
    while let Some(joined) = connections.join_next().await {
        log_connection_exit(joined);
    }
}

fn log_connection_exit(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        if err.is_panic() {
            warn!(error = %err, "connection task panicked");
        }
    }
}
