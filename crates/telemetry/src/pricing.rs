//! Built-in pricing table for Anthropic models.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and
//! output price. Custom pricing can be added at startup via TOML config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Pricing table with built-in defaults and custom overrides.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        prices.insert("claude-sonnet-4-5".into(), ModelPricing::new(3.0, 15.0));
        prices.insert("claude-sonnet-4".into(), ModelPricing::new(3.0, 15.0));
        prices.insert("claude-opus-4-1".into(), ModelPricing::new(15.0, 75.0));
        prices.insert("claude-opus-4".into(), ModelPricing::new(15.0, 75.0));
        prices.insert("claude-haiku-4-5".into(), ModelPricing::new(1.0, 5.0));
        prices.insert("claude-3-7-sonnet".into(), ModelPricing::new(3.0, 15.0));
        prices.insert("claude-3-5-sonnet".into(), ModelPricing::new(3.0, 15.0));
        prices.insert("claude-3-5-haiku".into(), ModelPricing::new(0.8, 4.0));
        prices.insert("claude-3-haiku".into(), ModelPricing::new(0.25, 1.25));

        Self { prices }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Add or update pricing for a model.
    pub fn set(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.insert(model.into(), pricing);
    }

    pub fn with_override(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.set(model, pricing);
        self
    }

    /// Look up pricing for a model.
    ///
    /// Tries an exact match, then the name without a provider prefix
    /// (`anthropic/claude-sonnet-4` → `claude-sonnet-4`), then the longest
    /// known name that prefixes the model (`claude-sonnet-4-5-20250929`
    /// matches `claude-sonnet-4-5`).
    pub fn lookup(&self, model: &str) -> Option<&ModelPricing> {
        if let Some(p) = self.prices.get(model) {
            return Some(p);
        }

        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);
        if let Some(p) = self.prices.get(bare_model) {
            return Some(p);
        }

        self.prices
            .iter()
            .filter(|(key, _)| {
                let bare_key = key.rsplit('/').next().unwrap_or(key).to_lowercase();
                bare_model.starts_with(&bare_key)
            })
            .max_by_key(|(key, _)| key.len())
            .map(|(_, pricing)| pricing)
    }

    /// Compute cost for a model call, returning 0.0 if the model is unknown.
    pub fn compute_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        match self.lookup(model) {
            Some(pricing) => pricing.cost(input_tokens, output_tokens),
            None => {
                tracing::debug!(model, "No pricing for model, cost counted as zero");
                0.0
            }
        }
    }

    /// List all known model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prices.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
