pub mod api;
pub mod cli;
pub mod core;
pub mod providers;
pub mod service;
pub mod store;

use crate::core::config::AppConfig;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

pub enum AppCommand {
    Fetch,
    Server,
}

pub async fn run_command(command: AppCommand, config: &AppConfig) -> Result<()> {
    let store = store::connect(&config.database).await?;
    let provider = providers::RssProvider::new(&config.feed_url, config.fetch_timeout)?;
    debug!("Using rate feed {}", config.feed_url);

    let service = service::RateService::new(Arc::new(provider), store);

    match command {
        AppCommand::Fetch => cli::fetch::run(&service).await,
        AppCommand::Server => cli::server::run(service, &config.server_addr).await,
    }
}
