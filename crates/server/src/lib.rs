//! Transport multiplexer: pipe, HTTP, and WebSocket front ends sharing one
//! `protocol::McpServer`.

#![deny(missing_docs)]

mod auth;
mod cors;
mod error;
mod health;
mod http;
/// Logger initialization.
pub mod logger;
mod pipe;
mod rate_limit;
mod ws;

use std::sync::Arc;

use anyhow::anyhow;
use axum::{Router, routing::get};
use config::TransportKind;
use protocol::McpServer;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::Error;

/// Configuration for serving one transport.
pub struct ServeConfig {
    /// The tied-together protocol server (dispatcher, resources, prompts).
    pub mcp: Arc<McpServer>,
    /// The deserialized framework TOML configuration.
    pub config: config::Config,
    /// Cancellation token for graceful shutdown.
    pub shutdown_signal: CancellationToken,
    /// Optional oneshot sender to report the bound address back to the
    /// caller, useful when `listen_address` specifies port `0`.
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<std::net::SocketAddr>>,
}

/// Starts and runs the configured transport until its shutdown signal fires
/// (HTTP/WebSocket) or its input closes (pipe).
pub async fn serve(
    ServeConfig { mcp, config, shutdown_signal, bound_addr_sender }: ServeConfig,
) -> anyhow::Result<()> {
    match config.server.transport {
        TransportKind::Pipe => {
            log::info!("serving the pipe transport on stdin/stdout");
            pipe::run(mcp, shutdown_signal).await?;
            Ok(())
        }
        TransportKind::Http => serve_http(mcp, &config, shutdown_signal, bound_addr_sender).await,
        TransportKind::Websocket => serve_websocket(mcp, &config, shutdown_signal, bound_addr_sender).await,
    }
}

async fn serve_http(
    mcp: Arc<McpServer>,
    config: &config::Config,
    shutdown_signal: CancellationToken,
    bound_addr_sender: Option<tokio::sync::oneshot::Sender<std::net::SocketAddr>>,
) -> anyhow::Result<()> {
    let listen_address = config
        .server
        .listen_address
        .ok_or_else(|| anyhow!("`server.listen_address` is required for the `http` transport"))?;

    let mut app = http::router(mcp, &config.server);
    app = mount_health(app, config);

    bind_and_serve(app, listen_address, shutdown_signal, bound_addr_sender).await
}

async fn serve_websocket(
    mcp: Arc<McpServer>,
    config: &config::Config,
    shutdown_signal: CancellationToken,
    bound_addr_sender: Option<tokio::sync::oneshot::Sender<std::net::SocketAddr>>,
) -> anyhow::Result<()> {
    let listen_address = config
        .server
        .listen_address
        .ok_or_else(|| anyhow!("`server.listen_address` is required for the `websocket` transport"))?;

    let mut app = ws::router(mcp, &config.server);
    app = mount_health(app, config);

    bind_and_serve(app, listen_address, shutdown_signal, bound_addr_sender).await
}

/// Merges in the health route as an unlayered `Router` — merging keeps
/// each side's own layer stack, so this stays outside the auth/CORS layers
/// already applied to `app`. The health endpoint is never authenticated.
fn mount_health(app: Router, config: &config::Config) -> Router {
    if config.server.health.enabled {
        let health_router = Router::new().route(&config.server.health.path, get(health::health));
        app.merge(health_router)
    } else {
        app
    }
}

async fn bind_and_serve(
    app: Router,
    listen_address: std::net::SocketAddr,
    shutdown_signal: CancellationToken,
    bound_addr_sender: Option<tokio::sync::oneshot::Sender<std::net::SocketAddr>>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_address).await.map_err(Error::Bind)?;

    if let Some(sender) = bound_addr_sender {
        sender.send(listener.local_addr()?).expect("caller dropped the bound-address receiver");
    }

    log::info!("listening on http://{listen_address}");

    tokio::select! {
        result = axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()) => {
            result.map_err(Error::Server)?;
        }
        _ = shutdown_signal.cancelled() => {
            log::info!("received shutdown signal, shutting down gracefully");
        }
    }

    Ok(())
}
