//! Turns and content blocks.
//!
//! A conversation with the model is an ordered list of [`Turn`]s. Assistant
//! turns carry typed [`ContentBlock`]s; when the model asks for tools, the very
//! next turn must answer every request it made.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed unit of turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// Opaque structured arguments chosen by the model.
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn tool_error(tool_use_id: impl Into<String>, message: &str) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: format!("Error: {message}"),
            is_error: true,
        }
    }
}

/// One entry in the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    /// Plain text from the end user.
    User { text: String },
    /// Whatever the model produced, text and tool requests alike.
    Assistant { content: Vec<ContentBlock> },
    /// Answers to the tool requests of the preceding assistant turn.
    /// Sent to the model with the user role.
    ToolResults { results: Vec<ContentBlock> },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Ids of the tool requests in an assistant turn, in order.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        match self {
            Turn::Assistant { content } => content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Check that every tool-results turn directly answers the assistant turn
/// before it, and that no tool request is left unanswered.
pub fn validate_turns(turns: &[Turn]) -> Result<()> {
    let malformed = |index: usize, reason: String| Error::MalformedHistory {
        message_id: format!("turn {index}"),
        reason,
    };

    for (index, turn) in turns.iter().enumerate() {
        match turn {
            Turn::ToolResults { results } => {
                let Some(previous) = index.checked_sub(1).map(|i| &turns[i]) else {
                    return Err(malformed(index, "tool results cannot open a conversation".into()));
                };
                let requested: HashSet<&str> = previous.tool_use_ids().into_iter().collect();
                if requested.is_empty() {
                    return Err(malformed(
                        index,
                        "tool results must follow an assistant turn with tool requests".into(),
                    ));
                }

                let mut answered = HashSet::new();
                for block in results {
                    let ContentBlock::ToolResult { tool_use_id, .. } = block else {
                        return Err(malformed(index, "expected only tool_result blocks".into()));
                    };
                    if !requested.contains(tool_use_id.as_str()) {
                        return Err(malformed(index, format!("unknown tool_use_id {tool_use_id}")));
                    }
                    if !answered.insert(tool_use_id.as_str()) {
                        return Err(malformed(index, format!("duplicate result for {tool_use_id}")));
                    }
                }
                if answered.len() != requested.len() {
                    return Err(malformed(index, "not every tool request was answered".into()));
                }
            }
            Turn::Assistant { .. } if !turn.tool_use_ids().is_empty() => {
                if !matches!(turns.get(index + 1), Some(Turn::ToolResults { .. })) {
                    return Err(malformed(index, "tool requests left unanswered".into()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
