//! `geoagent tools` — Show the merged tool catalog.

use anyhow::Context;
use geoagent_config::AppConfig;

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store = super::open_store(&config, true).await?;
    let router = geoagent_gateway::tool_router(&config, store);

    let tools = router
        .list_tools()
        .await
        .with_context(|| format!("Could not reach the tool service at {}", config.tools.url))?;

    println!("🔧 {} tool(s) available", tools.len());
    println!();
    for tool in &tools {
        let summary = tool.description.lines().next().unwrap_or_default();
        println!("  {:<28} {}", tool.name, summary);
    }

    Ok(())
}
