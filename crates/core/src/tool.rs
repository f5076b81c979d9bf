//! Tool trait and tool router: the abstraction over agent capabilities.
//!
//! Local tools implement [`Tool`] and live in a [`ToolRegistry`]. The agent
//! loop only talks to a [`ToolRouter`], which lists the catalog and dispatches
//! calls by name wherever the tool actually lives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A tool request taken from an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    /// Matches the model's tool_use block id
    pub id: String,

    pub name: String,

    pub arguments: serde_json::Value,
}

/// Strip an `mcp__<server>__` namespace from a tool name.
pub fn base_tool_name(name: &str) -> &str {
    name.strip_prefix("mcp__")
        .and_then(|rest| rest.split_once("__"))
        .map(|(_, base)| base)
        .unwrap_or(name)
}

/// A tool implemented in-process.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "remove_map_feature").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool and return its textual result.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<String, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Lists the tool catalog and dispatches calls by name.
#[async_trait]
pub trait ToolRouter: Send + Sync {
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDefinition>, ToolError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> std::result::Result<String, ToolError>;
}

/// Local tools in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRouter for ToolRegistry {
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDefinition>, ToolError> {
        Ok(self.definitions())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> std::result::Result<String, ToolError> {
        self.execute(name, arguments.clone()).await
    }
}
