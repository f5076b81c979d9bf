//! HTTP client for the remote geospatial tool service.
//!
//! The service exposes two JSON endpoints:
//! - `POST /tools/list` → `{ "tools": [{ name, description, inputSchema }] }`
//! - `POST /tools/call` with `{ name, arguments }` → `{ "content": [{ type, text }] }`

use async_trait::async_trait;
use geoagent_core::error::ToolError;
use geoagent_core::provider::ToolDefinition;
use geoagent_core::tool::ToolRouter;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct RemoteToolRouter {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteToolRouter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(60))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Deserialize)]
struct ListToolsResponse {
    #[serde(default)]
    tools: Vec<ToolDefinition>,
}

#[derive(Debug, Deserialize)]
struct CallToolResponse {
    #[serde(default)]
    content: Vec<ToolContent>,
}

#[derive(Debug, Deserialize)]
struct ToolContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl ToolRouter for RemoteToolRouter {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        let url = format!("{}/tools/list", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ToolError::CatalogUnavailable(format!("Failed to list tools: {e}")))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::CatalogUnavailable(format!("Failed to list tools: {body}")));
        }

        let parsed: ListToolsResponse = response
            .json()
            .await
            .map_err(|e| ToolError::CatalogUnavailable(format!("Failed to list tools: {e}")))?;

        debug!(count = parsed.tools.len(), url = %self.base_url, "Listed remote tools");
        Ok(parsed.tools)
    }

    async fn call_tool(&self, name: &str, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: name.to_string(),
            reason,
        };

        let url = format!("{}/tools/call", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "name": name, "arguments": arguments }))
            .send()
            .await
            .map_err(|e| failed(format!("Failed to call tool: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(tool = name, status = status.as_u16(), "Remote tool call failed");
            return Err(failed(format!("Failed to call tool: {} - {body}", status.as_u16())));
        }

        let parsed: CallToolResponse = response
            .json()
            .await
            .map_err(|_| failed("Unexpected tool response format".into()))?;

        parsed
            .content
            .into_iter()
            .next()
            .filter(|c| c.kind == "text")
            .and_then(|c| c.text)
            .ok_or_else(|| failed("Unexpected tool response format".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn lists_remote_catalog() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tools/list")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "tools": [{
                        "name": "calculate_distance",
                        "description": "Great-circle distance",
                        "inputSchema": {"type": "object", "properties": {"lat1": {"type": "number"}}}
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let router = RemoteToolRouter::new(server.url());
        let tools = router.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "calculate_distance");
        assert_eq!(tools[0].input_schema["properties"]["lat1"]["type"], "number");
    }

    #[tokio::test]
    async fn list_failure_carries_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/tools/list")
            .with_status(503)
            .with_body("warming up")
            .create_async()
            .await;

        let err = RemoteToolRouter::new(server.url()).list_tools().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to list tools: warming up");
    }

    #[tokio::test]
    async fn call_returns_first_text_block() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/tools/call")
            .match_body(Matcher::Json(json!({
                "name": "geocode_address",
                "arguments": {"address": "Oslo"}
            })))
            .with_status(200)
            .with_body(json!({"content": [{"type": "text", "text": "{\"lat\":59.91,\"lon\":10.75}"}]}).to_string())
            .create_async()
            .await;

        let router = RemoteToolRouter::new(server.url());
        let text = router
            .call_tool("geocode_address", &json!({"address": "Oslo"}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(text, "{\"lat\":59.91,\"lon\":10.75}");
    }

    #[tokio::test]
    async fn call_errors_are_reported() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/tools/call")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let router = RemoteToolRouter::new(server.url());
        let err = router.call_tool("calculate_area", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to call tool: 500 - boom");
        failing.remove_async().await;

        server
            .mock("POST", "/tools/call")
            .with_status(200)
            .with_body(json!({"content": [{"type": "image", "data": "..."}]}).to_string())
            .create_async()
            .await;
        let err = router.call_tool("calculate_area", &json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Unexpected tool response format");
    }
}
