mod config;

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::info;

use courier_gateway::Relay;
use courier_store::ConversationStore;

use crate::config::Config;

/// Pending connections the kernel queues before accept.
const LISTEN_BACKLOG: i32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_server=debug,courier_gateway=debug,courier_codec=info,courier_store=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "Limits: {} connections, {} users, {}s idle timeout, {} byte bodies",
        config.relay.max_connections,
        config.relay.max_users,
        config.relay.idle_timeout.as_secs(),
        config.relay.max_body_len
    );

    let listener = bind(config.addr)?;
    info!("Courier relay listening on {}", config.addr);

    let relay = Relay::new(ConversationStore::new(), config.relay);
    relay.run(listener, shutdown_signal()).await;

    info!("Courier relay stopped");
    Ok(())
}

fn bind(addr: SocketAddr) -> anyhow::Result<tokio::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    let std_listener: std::net::TcpListener = socket.into();
    Ok(tokio::net::TcpListener::from_std(std_listener)?)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
