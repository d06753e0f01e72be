//! Per-model token pricing
//!
//! Used to derive the cost of an execution when the provider adapter does
//! not report one. Prices are per million tokens; models missing from the
//! table cost nothing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::task::TokenUsage;

/// Pricing information for a model (per million tokens)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model identifier
    pub model: String,
    /// Cost per million input tokens in USD
    pub input_price_per_million: f64,
    /// Cost per million output tokens in USD
    pub output_price_per_million: f64,
}

impl ModelPricing {
    pub fn new(model: impl Into<String>, input_price: f64, output_price: f64) -> Self {
        Self {
            model: model.into(),
            input_price_per_million: input_price,
            output_price_per_million: output_price,
        }
    }

    /// Cost in USD for the given usage
    pub fn calculate_cost(&self, usage: &TokenUsage) -> f64 {
        let input = (usage.prompt_tokens as f64 / 1_000_000.0) * self.input_price_per_million;
        let output = (usage.completion_tokens as f64 / 1_000_000.0) * self.output_price_per_million;
        input + output
    }
}

/// Lookup table of model prices
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut table = Self::empty();

        // Prices per million tokens, early 2025 list prices
        for (model, input, output) in [
            ("gpt-4o", 2.50, 10.0),
            ("gpt-4o-mini", 0.15, 0.60),
            ("text-embedding-3-small", 0.02, 0.0),
            ("claude-sonnet-4", 3.0, 15.0),
            ("claude-3-5-haiku", 0.80, 4.0),
            ("claude-opus-4", 15.0, 75.0),
            ("gemini-2.0-flash", 0.10, 0.40),
            ("gemini-1.5-pro", 1.25, 5.0),
            ("text-embedding-004", 0.0, 0.0),
            ("mistral-large", 2.0, 6.0),
            ("mistral-small", 0.20, 0.60),
            ("mistral-embed", 0.10, 0.0),
        ] {
            table.insert(ModelPricing::new(model, input, output));
        }

        table
    }
}

impl PricingTable {
    /// Table with no prices
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Add or replace a model's pricing
    pub fn insert(&mut self, pricing: ModelPricing) {
        self.prices.insert(pricing.model.clone(), pricing);
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.insert(pricing);
        self
    }

    /// Pricing for a model, if known
    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.prices.get(model)
    }

    /// Cost in USD of `usage` on `model`; 0.0 when the model is unknown
    pub fn cost_for(&self, model: &str, usage: &TokenUsage) -> f64 {
        self.get(model)
            .map(|p| p.calculate_cost(usage))
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_cost() {
        let pricing = ModelPricing::new("gpt-4o", 2.50, 10.0);
        let usage = TokenUsage::new(1_000_000, 500_000);
        assert!((pricing.calculate_cost(&usage) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_is_free() {
        let table = PricingTable::default();
        assert_eq!(table.cost_for("my-local-model", &TokenUsage::new(1000, 1000)), 0.0);
    }

    #[test]
    fn test_custom_pricing_overrides_default() {
        let table = PricingTable::default().with_pricing(ModelPricing::new("gpt-4o", 1.0, 1.0));
        let cost = table.cost_for("gpt-4o", &TokenUsage::new(500_000, 500_000));
        assert!((cost - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_table_covers_default_registry() {
        let table = PricingTable::default();
        assert!(!table.is_empty());
        for model in ["gpt-4o", "claude-sonnet-4", "gemini-2.0-flash", "mistral-large"] {
            assert!(table.get(model).is_some(), "missing {}", model);
        }
    }
}
