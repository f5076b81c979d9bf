pub mod ask;
pub mod migrate;
pub mod serve;
pub mod tools;

use anyhow::Context;
use geoagent_config::AppConfig;
use geoagent_core::store::ConversationStore;
use geoagent_store::{InMemoryStore, PostgresStore};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    debug!(path = ?path, "Loading configuration");
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.context("Failed to load config")
}

/// The conversation store: PostgreSQL unless `ephemeral` is set.
pub async fn open_store(config: &AppConfig, ephemeral: bool) -> anyhow::Result<Arc<dyn ConversationStore>> {
    if ephemeral {
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let store = PostgresStore::from_config(&config.database)
        .await
        .context("Failed to connect to the database")?;
    Ok(Arc::new(store))
}
