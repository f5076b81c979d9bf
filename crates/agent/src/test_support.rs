//! Shared test doubles for the loop and service tests.

use async_trait::async_trait;
use geoagent_core::error::{ProviderError, ToolError};
use geoagent_core::message::ContentBlock;
use geoagent_core::provider::{ModelRequest, ModelResponse, Provider, StopReason, ToolDefinition, Usage};
use geoagent_core::tool::ToolRouter;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Returns scripted responses in order and keeps every request.
///
/// Fails with `InvalidResponse` once the script runs out.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ModelResponse>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))
    }
}

/// Canned tool results keyed by tool name, recording call order.
///
/// Unknown tools answer `{}`.
#[derive(Default)]
pub struct StubRouter {
    results: HashMap<String, Result<String, String>>,
    list_error: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StubRouter {
    pub fn with(mut self, name: &str, result: Result<&str, &str>) -> Self {
        self.results
            .insert(name.into(), result.map(str::to_string).map_err(str::to_string));
        self
    }

    pub fn unreachable(reason: &str) -> Self {
        Self {
            list_error: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRouter for StubRouter {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        if let Some(reason) = &self.list_error {
            return Err(ToolError::CatalogUnavailable(reason.clone()));
        }
        let mut names: Vec<&String> = self.results.keys().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| ToolDefinition {
                name: name.clone(),
                description: String::new(),
                input_schema: serde_json::json!({"type": "object"}),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, _arguments: &serde_json::Value) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push(name.to_string());
        match self.results.get(name) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(reason)) => Err(ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: reason.clone(),
            }),
            None => Ok("{}".into()),
        }
    }
}

pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        id: "msg_text".into(),
        model: "claude-sonnet-4-5-20250929".into(),
        content: vec![ContentBlock::text(text)],
        stop_reason: StopReason::EndTurn,
        usage: Usage {
            input_tokens: 100,
            output_tokens: 20,
        },
    }
}

pub fn tool_response(calls: &[(&str, &str, serde_json::Value)]) -> ModelResponse {
    ModelResponse {
        id: "msg_tools".into(),
        model: "claude-sonnet-4-5-20250929".into(),
        content: calls
            .iter()
            .map(|(id, name, input)| ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            })
            .collect(),
        stop_reason: StopReason::ToolUse,
        usage: Usage {
            input_tokens: 200,
            output_tokens: 40,
        },
    }
}
