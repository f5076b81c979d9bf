//! One catalog over local and remote tools.
//!
//! Local tools shadow remote tools of the same name, both in the listed
//! catalog and when dispatching calls.

use async_trait::async_trait;
use geoagent_core::error::ToolError;
use geoagent_core::provider::ToolDefinition;
use geoagent_core::tool::{ToolRegistry, ToolRouter};
use std::sync::Arc;
use tracing::debug;

pub struct CompositeToolRouter {
    local: ToolRegistry,
    remote: Option<Arc<dyn ToolRouter>>,
}

impl CompositeToolRouter {
    pub fn new(local: ToolRegistry) -> Self {
        Self { local, remote: None }
    }

    pub fn with_remote(mut self, remote: Arc<dyn ToolRouter>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn local(&self) -> &ToolRegistry {
        &self.local
    }
}

#[async_trait]
impl ToolRouter for CompositeToolRouter {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        let mut tools = self.local.definitions();
        if let Some(remote) = &self.remote {
            let remote_tools = remote.list_tools().await?;
            tools.extend(remote_tools.into_iter().filter(|t| !self.local.contains(&t.name)));
        }
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: &serde_json::Value) -> Result<String, ToolError> {
        if self.local.contains(name) {
            debug!(tool = name, "Dispatching to local tool");
            return self.local.execute(name, arguments.clone()).await;
        }
        match &self.remote {
            Some(remote) => remote.call_tool(name, arguments).await,
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }
}
