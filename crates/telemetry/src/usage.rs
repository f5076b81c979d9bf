//! Per-run token usage accounting.

use serde::{Deserialize, Serialize};

use crate::pricing::PricingTable;

/// Aggregated usage for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    pub api_calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
}

/// Accumulates model calls as a run progresses.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    pricing: PricingTable,
    summary: CostSummary,
}

impl UsageTracker {
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            pricing,
            summary: CostSummary::default(),
        }
    }

    /// Record one model call. `input_tokens` should already include cache tokens.
    pub fn record(&mut self, model: &str, input_tokens: u32, output_tokens: u32) {
        let (input, output) = (u64::from(input_tokens), u64::from(output_tokens));
        let s = &mut self.summary;
        s.api_calls += 1;
        s.input_tokens += input;
        s.output_tokens += output;
        s.total_tokens = s.input_tokens + s.output_tokens;
        s.estimated_cost_usd += self.pricing.compute_cost(model, input, output);
    }

    pub fn summary(&self) -> CostSummary {
        self.summary.clone()
    }

    /// Log the summary the way operators read it at the end of a run.
    pub fn log_summary(&self) {
        let s = &self.summary;
        tracing::info!(
            api_calls = s.api_calls,
            input_tokens = s.input_tokens,
            output_tokens = s.output_tokens,
            total_tokens = s.total_tokens,
            estimated_cost_usd = %format!("{:.4}", s.estimated_cost_usd),
            "Token usage summary"
        );
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(PricingTable::with_defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_calls() {
        let mut tracker = UsageTracker::default();
        tracker.record("claude-sonnet-4-5-20250929", 1000, 200);
        tracker.record("claude-sonnet-4-5-20250929", 3000, 300);

        let summary = tracker.summary();
        assert_eq!(summary.api_calls, 2);
        assert_eq!(summary.input_tokens, 4000);
        assert_eq!(summary.output_tokens, 500);
        assert_eq!(summary.total_tokens, 4500);
        // (4000 * 3 + 500 * 15) / 1M
        assert!((summary.estimated_cost_usd - 0.0195).abs() < 1e-10);
    }

    #[test]
    fn empty_run_is_zero() {
        let tracker = UsageTracker::default();
        assert_eq!(tracker.summary(), CostSummary::default());
    }

    #[test]
    fn summary_wire_keys() {
        let mut tracker = UsageTracker::new(PricingTable::empty());
        tracker.record("anything", 10, 5);
        let value = serde_json::to_value(tracker.summary()).unwrap();
        assert_eq!(value["api_calls"], 1);
        assert_eq!(value["total_tokens"], 15);
        assert_eq!(value["estimated_cost_usd"], 0.0);
    }
}
