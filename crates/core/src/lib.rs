//! # geoagent Core
//!
//! Domain types, traits, and error definitions for the geoagent GIS assistant.
//! This crate has **no framework dependencies**: it defines the model that the
//! provider, tool, store, agent and gateway crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: turns and content blocks exchanged with the model
//! - [`provider`]: the model client seam
//! - [`tool`]: local tools and the tool router seam
//! - [`history`]: the append-only run history
//! - [`feature`]: map features derived from tool results
//! - [`event`]: progress events and sinks
//! - [`store`]: the persistence adapter seam

pub mod error;
pub mod event;
pub mod feature;
pub mod history;
pub mod message;
pub mod provider;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, ToolError};
pub use event::{ChannelSink, LoopEvent, NoopSink, ProgressSink};
pub use feature::{FeatureKind, GeoFeature, StoredFeature};
pub use history::{HistoryEntry, HistoryJournal, HistoryPayload};
pub use message::{validate_turns, ContentBlock, ConversationId, Turn};
pub use provider::{ModelRequest, ModelResponse, Provider, StopReason, ToolDefinition, Usage};
pub use store::{ConversationRecord, ConversationStore, MessageKind, StoredMessage};
pub use tool::{base_tool_name, Tool, ToolRegistry, ToolRouter, ToolUse};
