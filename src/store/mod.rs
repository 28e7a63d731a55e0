pub mod memory;
pub mod mysql;
pub mod sqlite;

use crate::core::RateStore;
use crate::core::config::{DatabaseConfig, DbDriver};
use anyhow::{Context, Result};
pub use memory::MemoryStore;
pub use mysql::MySqlStore;
pub use sqlite::SqliteStore;
use std::sync::Arc;

/// Opens the configured database and prepares its schema.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn RateStore>> {
    let url = config.url()?;
    let failed = || format!("Failed to open {:?} database {}", config.driver, config.name);

    let store: Arc<dyn RateStore> = match config.driver {
        DbDriver::MySql => Arc::new(
            MySqlStore::connect(&url, config.max_connections)
                .await
                .with_context(failed)?,
        ),
        DbDriver::Sqlite => Arc::new(
            SqliteStore::connect(&url, config.max_connections)
                .await
                .with_context(failed)?,
        ),
    };
    Ok(store)
}
