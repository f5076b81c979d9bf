//! ConversationStore trait: the persistence adapter seam.
//!
//! Conversations own an ordered list of messages. Two message kinds make up
//! the model-visible transcript (`user`, `assistant`); the rest are history
//! entries journaled while a run executes. Features hang off the assistant
//! message that produced them.
//!
//! Implementations: PostgreSQL + PostGIS, in-memory (for testing).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, StoreError};
use crate::feature::{GeoFeature, StoredFeature};
use crate::history::HistoryEntry;
use crate::message::{ConversationId, Turn};

/// A conversation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The type column of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    UserPrompt,
    LlmResponse,
    ToolCall,
    ToolResult,
    ToolError,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Assistant => "assistant",
            MessageKind::UserPrompt => "user_prompt",
            MessageKind::LlmResponse => "llm_response",
            MessageKind::ToolCall => "tool_call",
            MessageKind::ToolResult => "tool_result",
            MessageKind::ToolError => "tool_error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "user" => MessageKind::User,
            "assistant" => MessageKind::Assistant,
            "user_prompt" => MessageKind::UserPrompt,
            "llm_response" => MessageKind::LlmResponse,
            "tool_call" => MessageKind::ToolCall,
            "tool_result" => MessageKind::ToolResult,
            "tool_error" => MessageKind::ToolError,
            _ => return None,
        })
    }

    /// Whether the kind belongs to the model-visible transcript.
    pub fn is_transcript(&self) -> bool {
        matches!(self, MessageKind::User | MessageKind::Assistant)
    }

    /// The role clients render this message under.
    pub fn role(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Assistant => "assistant",
            _ => "system",
        }
    }
}

/// A stored message row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: ConversationId,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sequence_number: i64,
    pub timestamp: DateTime<Utc>,
    pub content: serde_json::Value,
}

impl StoredMessage {
    /// Rebuild the model turn for a transcript message.
    ///
    /// Transcript content must look like `{ "text": string }`.
    pub fn to_turn(&self) -> std::result::Result<Turn, Error> {
        let text = self
            .content
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MalformedHistory {
                message_id: self.id.clone(),
                reason: "expected { text: string }".into(),
            })?;

        match self.kind {
            MessageKind::User => Ok(Turn::user(text)),
            MessageKind::Assistant => Ok(Turn::assistant_text(text)),
            other => Err(Error::MalformedHistory {
                message_id: self.id.clone(),
                reason: format!("{} is not a transcript message", other.as_str()),
            }),
        }
    }
}

/// The persistence adapter.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "postgres", "in_memory").
    fn name(&self) -> &str;

    async fn create_conversation(
        &self,
        id: Option<ConversationId>,
        title: Option<String>,
    ) -> std::result::Result<ConversationRecord, StoreError>;

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<Option<ConversationRecord>, StoreError>;

    /// Most recently updated first.
    async fn list_conversations(
        &self,
        limit: i64,
        offset: i64,
    ) -> std::result::Result<Vec<ConversationRecord>, StoreError>;

    /// Append a message, assigning the next per-conversation sequence number.
    async fn append_message(
        &self,
        conversation_id: &ConversationId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> std::result::Result<StoredMessage, StoreError>;

    /// Every message of a conversation, ordered by sequence number.
    async fn list_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> std::result::Result<Vec<StoredMessage>, StoreError>;

    /// Attach a feature to the message that produced it.
    async fn append_feature(
        &self,
        message_id: &str,
        feature: &GeoFeature,
    ) -> std::result::Result<(), StoreError>;

    async fn message_features(&self, message_id: &str) -> std::result::Result<Vec<StoredFeature>, StoreError>;

    /// All features of a conversation, oldest first.
    async fn conversation_features(
        &self,
        conversation_id: &ConversationId,
    ) -> std::result::Result<Vec<StoredFeature>, StoreError>;

    /// Case-insensitive substring match on labels, oldest first.
    async fn find_features_by_label(
        &self,
        conversation_id: &ConversationId,
        query: &str,
    ) -> std::result::Result<Vec<StoredFeature>, StoreError>;

    /// Returns whether a feature was removed.
    async fn delete_feature(&self, feature_id: &str) -> std::result::Result<bool, StoreError>;

    /// Bump the conversation's updated timestamp.
    async fn touch(&self, conversation_id: &ConversationId) -> std::result::Result<(), StoreError>;

    /// Transcript messages only, ordered by sequence number.
    async fn load_transcript(
        &self,
        conversation_id: &ConversationId,
    ) -> std::result::Result<Vec<StoredMessage>, StoreError> {
        let messages = self.list_messages(conversation_id).await?;
        Ok(messages.into_iter().filter(|m| m.kind.is_transcript()).collect())
    }

    /// Journal a run's history entry as a message of the same kind.
    async fn append_history_entry(
        &self,
        conversation_id: &ConversationId,
        entry: &HistoryEntry,
    ) -> std::result::Result<StoredMessage, StoreError> {
        let kind = MessageKind::parse(entry.kind())
            .ok_or_else(|| StoreError::Storage(format!("unknown history kind {}", entry.kind())))?;
        self.append_message(conversation_id, kind, entry.payload.content()).await
    }
}
