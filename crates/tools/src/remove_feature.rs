//! Map feature removal tool: lets the model delete a marker by label.
//!
//! The tool searches the conversation's features for a case-insensitive
//! substring match. One match is deleted; several matches are listed back
//! so the model can ask the user which one was meant.

use async_trait::async_trait;
use geoagent_core::error::ToolError;
use geoagent_core::message::ConversationId;
use geoagent_core::store::ConversationStore;
use geoagent_core::tool::Tool;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Name the loop watches for to emit removal events.
pub const REMOVE_FEATURE_TOOL: &str = "remove_map_feature";

pub struct RemoveFeatureTool {
    store: Arc<dyn ConversationStore>,
}

impl RemoveFeatureTool {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }
}

fn non_empty<'a>(arguments: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty())
}

#[async_trait]
impl Tool for RemoveFeatureTool {
    fn name(&self) -> &str {
        REMOVE_FEATURE_TOOL
    }

    fn description(&self) -> &str {
        "Remove a map feature by searching for it by label. IMPORTANT: Use the conversation_id \
         from the system prompt. Returns success message or disambiguation prompt."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "conversation_id": {
                    "type": "string",
                    "description": "REQUIRED: The conversation ID from the system prompt"
                },
                "query": {
                    "type": "string",
                    "description": "Search query for the feature label (e.g., \"Portland\"). Matches partial labels."
                }
            },
            "required": ["conversation_id", "query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let Some(conversation_id) = non_empty(&arguments, "conversation_id") else {
            return Ok(json!({ "success": false, "error": "conversation_id is required" }).to_string());
        };
        let Some(query) = non_empty(&arguments, "query") else {
            let received: Vec<&String> = arguments
                .as_object()
                .map(|o| o.keys().collect())
                .unwrap_or_default();
            return Ok(json!({
                "success": false,
                "error": "query parameter is required",
                "received_params": received
            })
            .to_string());
        };

        let conversation_id = ConversationId::from(conversation_id);
        let failed = |e: geoagent_core::error::StoreError| ToolError::ExecutionFailed {
            tool_name: REMOVE_FEATURE_TOOL.into(),
            reason: e.to_string(),
        };

        let matches = self
            .store
            .find_features_by_label(&conversation_id, query)
            .await
            .map_err(failed)?;
        debug!(conversation_id = %conversation_id, query, matches = matches.len(), "Feature search");

        match matches.as_slice() {
            [] => Ok(json!({
                "success": false,
                "message": format!("No features found matching \"{query}\"")
            })
            .to_string()),
            [feature] => {
                self.store.delete_feature(&feature.id).await.map_err(failed)?;
                info!(feature_id = %feature.id, conversation_id = %conversation_id, "Removed map feature");
                Ok(json!({
                    "success": true,
                    "removed_feature_id": feature.id,
                    "message": format!("Removed feature: {}", feature.display_label())
                })
                .to_string())
            }
            many => {
                let listing = many
                    .iter()
                    .enumerate()
                    .map(|(i, f)| {
                        format!(
                            "{}. {} ({} at {}, {})",
                            i + 1,
                            f.display_label(),
                            f.feature_type,
                            f.latitude,
                            f.longitude
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(json!({
                    "success": false,
                    "disambiguation_required": true,
                    "message": format!(
                        "Multiple features found matching \"{query}\":\n{listing}\n\n\
                         Please be more specific about which one to remove."
                    )
                })
                .to_string())
            }
        }
    }
}
