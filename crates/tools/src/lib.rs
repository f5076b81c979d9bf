//! Tool implementations and routing for geoagent.
//!
//! The model sees one catalog. Local tools (currently map feature removal)
//! are served in-process; everything else is forwarded to the remote
//! geospatial tool service over HTTP.

pub mod composite;
pub mod remote;
pub mod remove_feature;

use geoagent_core::store::ConversationStore;
use geoagent_core::tool::ToolRegistry;
use std::sync::Arc;

pub use composite::CompositeToolRouter;
pub use remote::RemoteToolRouter;
pub use remove_feature::{RemoveFeatureTool, REMOVE_FEATURE_TOOL};

/// Create the registry of local tools backed by the given store.
pub fn local_registry(store: Arc<dyn ConversationStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RemoveFeatureTool::new(store)));
    registry
}
