//! `geoagent migrate` — Create the PostGIS schema.

use anyhow::Context;
use geoagent_config::AppConfig;
use geoagent_store::PostgresStore;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    println!("🔄 Applying database schema...");
    match &config.database.url {
        Some(_) => println!("   Database: from DATABASE_URL"),
        None => println!(
            "   Database: {}:{}/{}",
            config.database.host, config.database.port, config.database.name
        ),
    }

    let store = PostgresStore::from_config(&config.database)
        .await
        .context("Failed to connect to the database")?;
    store.migrate().await.context("Migration failed")?;

    println!("   ✅ Schema is up to date");
    Ok(())
}
