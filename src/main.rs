use inspect_server::{config::Config, logging, shutdown, EchoServer};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let server = EchoServer::start(&config).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        max_body_bytes = config.max_body_bytes,
        "server starting"
    );

    let signals = tokio::spawn(shutdown::listen_for_shutdown_signals(
        server.shutdown_token(),
    ));

    server.wait().await?;

    signals.abort();
    match signals.await {
        Ok(result) => result?,
        Err(err) if err.is_cancelled() => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
