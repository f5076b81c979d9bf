//! Model provider implementations for geoagent.
//!
//! All providers implement the `geoagent_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
