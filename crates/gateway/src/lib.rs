//! HTTP API gateway for geoagent.
//!
//! Exposes the conversation API (see [`api`]) and a health check, with
//! messages answered as a Server-Sent Events stream of loop progress.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use axum::{Router, http::HeaderValue, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use geoagent_agent::{AgentLoop, ConversationService};
use geoagent_config::{AppConfig, ConfigError};
use geoagent_core::error::Error;
use geoagent_core::provider::Provider;
use geoagent_core::store::ConversationStore;
use geoagent_core::tool::ToolRouter;
use geoagent_providers::AnthropicProvider;
use geoagent_store::PostgresStore;
use geoagent_telemetry::{ModelPricing, PricingTable};
use geoagent_tools::{CompositeToolRouter, RemoteToolRouter, local_registry};

/// Shared application state for the gateway.
pub struct AppState {
    pub service: Arc<ConversationService>,
}

impl AppState {
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        self.service.store()
    }

    pub fn tools(&self) -> &Arc<dyn ToolRouter> {
        self.service.tools()
    }
}

pub type SharedState = Arc<AppState>;

/// Wire the conversation service from configuration: the Anthropic
/// provider, local tools backed by `store` in front of the remote tool
/// service, and pricing with any configured overrides.
///
/// Fails with [`Error::Config`] before anything is contacted when the API
/// key is missing.
pub fn assemble(config: &AppConfig, store: Arc<dyn ConversationStore>) -> geoagent_core::Result<ConversationService> {
    let api_key = config.require_api_key().map_err(config_error)?;
    let provider: Arc<dyn Provider> =
        Arc::new(AnthropicProvider::new(api_key).with_base_url(&config.anthropic.base_url));

    let tools = tool_router(config, store.clone());

    let mut pricing = PricingTable::with_defaults();
    for (model, price) in &config.telemetry.custom_pricing {
        pricing.set(model.clone(), ModelPricing::new(price.input_per_m, price.output_per_m));
    }

    let agent = AgentLoop::new(provider, tools.clone(), &config.anthropic.model)
        .with_max_tokens(config.anthropic.max_tokens)
        .with_temperature(config.anthropic.temperature)
        .with_max_tool_rounds(config.agent.max_tool_rounds)
        .with_pricing(pricing);

    info!(
        model = %config.anthropic.model,
        tool_service = %config.tools.url,
        store = store.name(),
        "Conversation service assembled"
    );
    Ok(ConversationService::new(agent, store, tools))
}

fn config_error(e: ConfigError) -> Error {
    Error::Config { message: e.to_string() }
}

/// Local tools backed by `store`, consulted before the remote tool service.
pub fn tool_router(config: &AppConfig, store: Arc<dyn ConversationStore>) -> Arc<dyn ToolRouter> {
    let remote = RemoteToolRouter::with_timeout(&config.tools.url, Duration::from_secs(config.tools.timeout_secs));
    Arc::new(CompositeToolRouter::new(local_registry(store)).with_remote(Arc::new(remote)))
}

/// Build the Axum router with all gateway routes.
///
/// An empty `cors_origins` allows any origin.
pub fn build_router(state: SharedState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(api::router(state))
        .layer(cors_layer(cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server against the PostgreSQL store.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = PostgresStore::from_config(&config.database).await?;
    let service = assemble(&config, Arc::new(store))?;
    let state = Arc::new(AppState {
        service: Arc::new(service),
    });

    let app = build_router(state, &config.gateway.cors_origins);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "geoagent",
        version: env!("CARGO_PKG_VERSION"),
    })
}
