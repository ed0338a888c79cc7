//! Integration Gateway - main entry point.
//!
//! Wires configuration, observability, shared state, and the router, then
//! serves with graceful shutdown.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;

use integration_gateway::{observability, routes, shutdown, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    observability::init_tracing();

    info!("Starting Integration Gateway");

    let state = AppState::from_config(&config).await?;
    let router = routes::build_router(
        state,
        Duration::from_secs(config.request_timeout_secs),
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Integration Gateway listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown::wait_for_signal())
    .await?;

    info!("Integration Gateway stopped");
    Ok(())
}
