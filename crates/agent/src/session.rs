//! Persistent conversations on top of the agent loop.
//!
//! [`ConversationService::send_message`] rebuilds the model-visible
//! transcript from the store, runs the loop with a journal that writes every
//! history entry as it happens, and on success stores the assistant reply
//! together with the features it produced.

use std::sync::Arc;

use async_trait::async_trait;
use geoagent_core::error::{Error, Result};
use geoagent_core::event::ProgressSink;
use geoagent_core::history::{HistoryEntry, HistoryJournal};
use geoagent_core::message::{ConversationId, Turn};
use geoagent_core::store::{ConversationStore, MessageKind};
use geoagent_core::tool::ToolRouter;
use serde_json::json;
use tracing::{debug, info};

use crate::loop_runner::{AgentLoop, LoopResult, RunContext};
use crate::prompt::build_system_prompt;

/// Writes history entries to the store as messages of the same kind.
pub struct StoreJournal<'a> {
    store: &'a dyn ConversationStore,
    conversation_id: &'a ConversationId,
}

impl<'a> StoreJournal<'a> {
    pub fn new(store: &'a dyn ConversationStore, conversation_id: &'a ConversationId) -> Self {
        Self { store, conversation_id }
    }
}

#[async_trait]
impl HistoryJournal for StoreJournal<'_> {
    async fn record(&self, entry: &HistoryEntry) -> Result<()> {
        self.store
            .append_history_entry(self.conversation_id, entry)
            .await?;
        Ok(())
    }
}

pub struct ConversationService {
    agent: AgentLoop,
    store: Arc<dyn ConversationStore>,
    tools: Arc<dyn ToolRouter>,
}

impl ConversationService {
    /// `tools` should be the router the agent dispatches to, so the listed
    /// catalog matches what can actually be called.
    pub fn new(agent: AgentLoop, store: Arc<dyn ConversationStore>, tools: Arc<dyn ToolRouter>) -> Self {
        Self { agent, store, tools }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn tools(&self) -> &Arc<dyn ToolRouter> {
        &self.tools
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Handle one user message in a conversation, creating it if needed.
    ///
    /// History entries are written as the run produces them, so a failed
    /// run leaves its partial history behind. The assistant reply and its
    /// features are only stored when the run succeeds.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        message: &str,
        sink: &dyn ProgressSink,
    ) -> Result<LoopResult> {
        if self.store.get_conversation(conversation_id).await?.is_none() {
            self.store
                .create_conversation(Some(conversation_id.clone()), None)
                .await?;
            info!(conversation_id = %conversation_id, "Created conversation");
        }

        let prior_turns = self
            .store
            .load_transcript(conversation_id)
            .await?
            .iter()
            .map(|m| m.to_turn())
            .collect::<Result<Vec<Turn>>>()?;

        let features = self.store.conversation_features(conversation_id).await?;
        let system_prompt = build_system_prompt(conversation_id, &features);

        let catalog = self
            .tools
            .list_tools()
            .await
            .map_err(|e| Error::ToolList(e.to_string()))?;

        debug!(
            conversation_id = %conversation_id,
            prior_turns = prior_turns.len(),
            map_features = features.len(),
            tools = catalog.len(),
            "Prepared conversation context"
        );

        self.store
            .append_message(conversation_id, MessageKind::User, json!({ "text": message }))
            .await?;

        let journal = StoreJournal::new(self.store.as_ref(), conversation_id);
        let result = self
            .agent
            .run_in(
                RunContext {
                    system_prompt: Some(system_prompt),
                    journal: Some(&journal),
                },
                message,
                prior_turns,
                &catalog,
                sink,
            )
            .await?;

        let reply = self
            .store
            .append_message(
                conversation_id,
                MessageKind::Assistant,
                json!({ "text": result.final_text }),
            )
            .await?;
        for feature in &result.features {
            self.store.append_feature(&reply.id, feature).await?;
        }
        self.store.touch(conversation_id).await?;

        info!(
            conversation_id = %conversation_id,
            features = result.features.len(),
            api_calls = result.usage.api_calls,
            "Message processed"
        );
        Ok(result)
    }
}
