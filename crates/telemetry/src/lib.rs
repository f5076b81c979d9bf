//! Token usage and cost accounting for geoagent.
//!
//! Every model call in a run is recorded against a [`UsageTracker`]; the
//! resulting [`CostSummary`] is attached to the run result and logged when
//! the run finishes. Prices come from a [`PricingTable`] with built-in
//! Anthropic rates and config overrides.

pub mod pricing;
pub mod usage;

pub use pricing::{ModelPricing, PricingTable};
pub use usage::{CostSummary, UsageTracker};
