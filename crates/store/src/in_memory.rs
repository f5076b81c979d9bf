//! In-memory store, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use geoagent_core::error::StoreError;
use geoagent_core::feature::{GeoFeature, StoredFeature};
use geoagent_core::message::ConversationId;
use geoagent_core::store::{ConversationRecord, ConversationStore, MessageKind, StoredMessage};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

#[derive(Default)]
struct State {
    conversations: Vec<ConversationRecord>,
    messages: Vec<StoredMessage>,
    /// Insertion order doubles as creation order
    features: Vec<StoredFeature>,
}

/// A store that keeps everything in process memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_conversation(
        &self,
        id: Option<ConversationId>,
        title: Option<String>,
    ) -> Result<ConversationRecord, StoreError> {
        let mut state = self.state.write().await;
        let id = id.unwrap_or_default();
        if state.conversations.iter().any(|c| c.id == id) {
            return Err(StoreError::Storage(format!("Conversation {id} already exists")));
        }

        let now = Utc::now();
        let record = ConversationRecord {
            id,
            title,
            created_at: now,
            updated_at: now,
        };
        state.conversations.push(record.clone());
        Ok(record)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<ConversationRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.conversations.iter().find(|c| &c.id == id).cloned())
    }

    async fn list_conversations(&self, limit: i64, offset: i64) -> Result<Vec<ConversationRecord>, StoreError> {
        let state = self.state.read().await;
        let mut records = state.conversations.clone();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn append_message(
        &self,
        conversation_id: &ConversationId,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> Result<StoredMessage, StoreError> {
        let mut state = self.state.write().await;
        if !state.conversations.iter().any(|c| &c.id == conversation_id) {
            return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
        }

        let sequence_number = state
            .messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .map(|m| m.sequence_number)
            .max()
            .unwrap_or(0)
            + 1;

        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            kind,
            sequence_number,
            timestamp: Utc::now(),
            content,
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: &ConversationId) -> Result<Vec<StoredMessage>, StoreError> {
        let state = self.state.read().await;
        let mut messages: Vec<StoredMessage> = state
            .messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.sequence_number);
        Ok(messages)
    }

    async fn append_feature(&self, message_id: &str, feature: &GeoFeature) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.messages.iter().any(|m| m.id == message_id) {
            return Err(StoreError::Storage(format!("Message {message_id} does not exist")));
        }
        if state.features.iter().any(|f| f.id == feature.id) {
            warn!(feature_id = %feature.id, message_id, "Feature already stored, keeping the existing row");
            return Ok(());
        }

        state.features.push(StoredFeature {
            id: feature.id.clone(),
            message_id: message_id.to_string(),
            feature_type: feature.kind.as_str().to_string(),
            latitude: feature.latitude,
            longitude: feature.longitude,
            label: Some(feature.label.clone()),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn message_features(&self, message_id: &str) -> Result<Vec<StoredFeature>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .features
            .iter()
            .filter(|f| f.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn conversation_features(&self, conversation_id: &ConversationId) -> Result<Vec<StoredFeature>, StoreError> {
        let state = self.state.read().await;
        let message_ids: Vec<&str> = state
            .messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .map(|m| m.id.as_str())
            .collect();
        Ok(state
            .features
            .iter()
            .filter(|f| message_ids.contains(&f.message_id.as_str()))
            .cloned()
            .collect())
    }

    async fn find_features_by_label(
        &self,
        conversation_id: &ConversationId,
        query: &str,
    ) -> Result<Vec<StoredFeature>, StoreError> {
        let needle = query.to_lowercase();
        let features = self.conversation_features(conversation_id).await?;
        Ok(features
            .into_iter()
            .filter(|f| {
                f.label
                    .as_deref()
                    .is_some_and(|label| label.to_lowercase().contains(&needle))
            })
            .collect())
    }

    async fn delete_feature(&self, feature_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.features.len();
        state.features.retain(|f| f.id != feature_id);
        Ok(state.features.len() < before)
    }

    async fn touch(&self, conversation_id: &ConversationId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let record = state
            .conversations
            .iter_mut()
            .find(|c| &c.id == conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))?;
        record.updated_at = Utc::now();
        Ok(())
    }
}
