//! The append-only record of what happened during a run.
//!
//! Every entry carries a kind and a payload with stable keys; clients and the
//! store read those keys directly, so renaming one is a breaking change.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::ContentBlock;

/// What an entry records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryPayload {
    UserPrompt {
        prompt: String,
    },
    LlmResponse {
        content: Vec<ContentBlock>,
        stop_reason: String,
    },
    ToolCall {
        tool_use_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        result: String,
    },
    ToolError {
        tool_use_id: String,
        tool_name: String,
        error: String,
    },
}

impl HistoryPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryPayload::UserPrompt { .. } => "user_prompt",
            HistoryPayload::LlmResponse { .. } => "llm_response",
            HistoryPayload::ToolCall { .. } => "tool_call",
            HistoryPayload::ToolResult { .. } => "tool_result",
            HistoryPayload::ToolError { .. } => "tool_error",
        }
    }

    /// The payload object without its kind tag.
    pub fn content(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(object) = value.as_object_mut() {
            object.remove("type");
        }
        value
    }
}

/// One entry in a run's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 1-based position within the run
    pub sequence: u64,

    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub payload: HistoryPayload,
}

impl HistoryEntry {
    pub fn new(sequence: u64, payload: HistoryPayload) -> Self {
        Self {
            sequence,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Durable destination for history entries as a run produces them.
///
/// A failing journal fails the run; entries written before the failure stay.
#[async_trait]
pub trait HistoryJournal: Send + Sync {
    async fn record(&self, entry: &HistoryEntry) -> Result<()>;
}
