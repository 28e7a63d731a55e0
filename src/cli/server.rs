use crate::api;
use crate::service::RateService;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

/// Serves the read endpoints until the listener fails.
pub async fn run(service: RateService, addr: &str) -> Result<()> {
    let app = api::create_router(service);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .await
        .context("Failed to start server")
}
