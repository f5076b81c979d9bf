//! Provider trait: the abstraction over the model backend.
//!
//! A Provider sends a system context, the turns so far and the tool catalog
//! to a model and returns the model's content blocks with a stop reason.
//! The agent loop never knows which vendor sits behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{ContentBlock, Turn};
use crate::tool::ToolUse;

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the tool's input
    #[serde(alias = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// One model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub turns: Vec<Turn>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::ToolUse => "tool_use",
            StopReason::MaxTokens => "max_tokens",
            StopReason::StopSequence => "stop_sequence",
            StopReason::Other(other) => other,
        }
    }
}

impl From<String> for StopReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::Other(value),
        }
    }
}

impl From<StopReason> for String {
    fn from(value: StopReason) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage for one model call. `input_tokens` already includes
/// cache-creation and cache-read input tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub id: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    pub content: Vec<ContentBlock>,

    pub stop_reason: StopReason,

    #[serde(default)]
    pub usage: Usage,
}

impl ModelResponse {
    /// Text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool requests in the order the model emitted them.
    pub fn tool_uses(&self) -> Vec<ToolUse> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ModelRequest) -> std::result::Result<ModelResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stop_reason_round_trips_unknown_values() {
        let reason: StopReason = serde_json::from_value(json!("pause_turn")).unwrap();
        assert_eq!(reason, StopReason::Other("pause_turn".into()));
        assert_eq!(serde_json::to_value(&reason).unwrap(), json!("pause_turn"));
        assert_eq!(StopReason::from("tool_use".to_string()), StopReason::ToolUse);
    }

    #[test]
    fn tool_definition_accepts_camel_case_schema() {
        let def: ToolDefinition = serde_json::from_value(json!({
            "name": "calculate_distance",
            "description": "Distance between two points",
            "inputSchema": {"type": "object"}
        }))
        .unwrap();
        assert_eq!(def.input_schema["type"], "object");
    }

    #[test]
    fn response_text_and_tool_uses() {
        let response = ModelResponse {
            id: "msg_1".into(),
            model: "claude-sonnet-4-5-20250929".into(),
            content: vec![
                ContentBlock::text("first"),
                ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "geocode_address".into(),
                    input: json!({"address": "Paris"}),
                },
                ContentBlock::text("second"),
            ],
            stop_reason: StopReason::ToolUse,
            usage: Usage::default(),
        };
        assert_eq!(response.text(), "first\nsecond");
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].arguments["address"], "Paris");
    }
}
