//! `geoagent serve` — Start the HTTP API server.

use geoagent_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    config.require_api_key()?;

    println!("🗺️  geoagent gateway");
    println!("   Listening:    {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:        {}", config.anthropic.model);
    println!("   Tool service: {}", config.tools.url);

    geoagent_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway failed: {e}"))?;

    Ok(())
}
