//! The agent side of geoagent: the tool-use loop and the conversation
//! service that persists it.
//!
//! 1. **Load** the conversation transcript and current map features
//! 2. **Build** the system prompt with that map context
//! 3. **Call** the model with the merged tool catalog
//! 4. **If tool use**: run the requested tools in order, feed the results
//!    back, and call the model again
//! 5. **Otherwise**: store the reply and the features it produced
//!
//! The loop gives up with an error after a fixed number of tool rounds.

pub mod features;
pub mod loop_runner;
pub mod prompt;
pub mod session;

#[cfg(test)]
mod test_support;

pub use features::extract_features;
pub use loop_runner::{AgentLoop, LoopResult, LoopState, RunContext};
pub use prompt::build_system_prompt;
pub use session::{ConversationService, StoreJournal};
