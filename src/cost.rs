//! Token-cost accounting.
//!
//! Pricing is a strategy table: an immutable mapping from base-model name to
//! an ordered list of provider offerings, resolved by first match unless a
//! provider is explicitly pinned. No provider inheritance, no global state -
//! the table is constructed once and passed in.

use crate::comparison::ComparisonRecord;
use crate::config::EvaluationConfig;
use crate::judge::UsageEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round a cost to 6 decimal places (micro-dollar precision).
fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// One provider's offering of a base model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderPricing {
    /// Provider name (e.g., "openai", "azure-openai")
    pub provider: String,

    /// The provider's own identifier for the model
    pub provider_model_id: String,

    /// USD per million input tokens
    pub input_cost_per_mtok: f64,

    /// USD per million output tokens
    pub output_cost_per_mtok: f64,
}

/// Immutable base-model -> ordered provider offerings mapping.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: BTreeMap<String, Vec<ProviderPricing>>,
}

impl PricingTable {
    /// Build a table from explicit entries. Per-model order is preserved and
    /// determines first-match resolution.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<ProviderPricing>)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// A table covering the judge models this harness is commonly run with.
    #[must_use]
    pub fn with_default_models() -> Self {
        let offering = |provider: &str, model_id: &str, input: f64, output: f64| ProviderPricing {
            provider: provider.to_string(),
            provider_model_id: model_id.to_string(),
            input_cost_per_mtok: input,
            output_cost_per_mtok: output,
        };

        Self::from_entries([
            (
                "gpt-4o".to_string(),
                vec![
                    offering("openai", "gpt-4o", 2.50, 10.00),
                    offering("azure-openai", "gpt-4o", 2.50, 10.00),
                ],
            ),
            (
                "gpt-4o-mini".to_string(),
                vec![
                    offering("openai", "gpt-4o-mini", 0.15, 0.60),
                    offering("azure-openai", "gpt-4o-mini", 0.15, 0.60),
                ],
            ),
            (
                "claude-3-5-sonnet".to_string(),
                vec![
                    offering("anthropic", "claude-3-5-sonnet-latest", 3.00, 15.00),
                    offering(
                        "bedrock",
                        "anthropic.claude-3-5-sonnet-20241022-v2:0",
                        3.00,
                        15.00,
                    ),
                ],
            ),
        ])
    }

    /// Resolve an offering for a base model.
    ///
    /// First match wins unless `pinned_provider` names a specific provider,
    /// in which case only that provider's offering is considered.
    #[must_use]
    pub fn resolve(&self, model: &str, pinned_provider: Option<&str>) -> Option<&ProviderPricing> {
        let offerings = self.entries.get(model)?;
        match pinned_provider {
            Some(provider) => offerings.iter().find(|p| p.provider == provider),
            None => offerings.first(),
        }
    }

    /// Estimate the USD cost of a set of usage entries.
    ///
    /// Pure: entries whose model has no offering contribute 0.
    #[must_use]
    pub fn estimate_cost(&self, usage: &[UsageEntry], pinned_provider: Option<&str>) -> f64 {
        let total: f64 = usage
            .iter()
            .filter_map(|entry| {
                self.resolve(&entry.model, pinned_provider).map(|pricing| {
                    let input =
                        f64::from(entry.input_tokens) / 1_000_000.0 * pricing.input_cost_per_mtok;
                    let output =
                        f64::from(entry.output_tokens) / 1_000_000.0 * pricing.output_cost_per_mtok;
                    input + output
                })
            })
            .sum();
        round6(total)
    }
}

/// Cost statistics for one completed iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationCost {
    /// Which iteration this describes
    pub iteration: u32,

    /// Test set the iteration ran against
    pub test_set_name: String,

    /// Number of records the totals cover
    pub samples: usize,

    /// Judge model label, from configuration
    pub judge_model: String,

    /// Judge provider label, from configuration
    pub judge_provider: String,

    /// Total tokens spent across all records
    pub total_tokens: u64,

    /// Estimated total USD cost
    pub total_cost: f64,

    /// `total_cost / samples`, 0 when there are no samples
    pub average_cost_per_sample: f64,

    /// When the statistics were computed
    pub generated_at: DateTime<Utc>,
}

/// Sum token usage across an iteration's records and convert to cost.
///
/// The judge provider from the configuration pins pricing resolution so the
/// reported cost matches the provider that actually served the calls.
#[must_use]
pub fn calculate_iteration_cost(
    iteration: u32,
    test_set_name: &str,
    records: &[ComparisonRecord],
    config: &EvaluationConfig,
    pricing: &PricingTable,
) -> IterationCost {
    let samples = records.len();

    let total_tokens: u64 = records
        .iter()
        .flat_map(|r| &r.token_usage)
        .map(|u| u64::from(u.total_tokens()))
        .sum();

    let total_cost = round6(
        records
            .iter()
            .map(|r| pricing.estimate_cost(&r.token_usage, Some(&config.judge_provider)))
            .sum(),
    );

    let average_cost_per_sample = if samples == 0 {
        0.0
    } else {
        round6(total_cost / samples as f64)
    };

    IterationCost {
        iteration,
        test_set_name: test_set_name.to_string(),
        samples,
        judge_model: config.judge_model.clone(),
        judge_provider: config.judge_provider.clone(),
        total_tokens,
        total_cost,
        average_cost_per_sample,
        generated_at: Utc::now(),
    }
}

/// Run-level cost totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateCostStats {
    /// Sum of each iteration's `samples`
    pub total_samples: usize,

    /// Sum of each iteration's tokens
    pub total_tokens: u64,

    /// Sum of each iteration's cost
    pub total_cost: f64,

    /// `total_cost / iterations`, 0 when there are none
    pub average_cost_per_iteration: f64,
}

/// Run-level cost statistics across all iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalCost {
    /// Test set the run evaluated
    pub test_set_name: String,

    /// Number of iterations aggregated
    pub iterations: u32,

    /// Summed totals
    pub aggregate_stats: AggregateCostStats,

    /// Per-iteration costs echoed verbatim for traceability
    pub per_iteration_costs: Vec<IterationCost>,

    /// When the aggregate was computed
    pub generated_at: DateTime<Utc>,
}

/// Sum per-iteration costs into run-level totals.
#[must_use]
pub fn calculate_final_cost(test_set_name: &str, per_iteration_costs: Vec<IterationCost>) -> FinalCost {
    let n = per_iteration_costs.len();
    let total_samples: usize = per_iteration_costs.iter().map(|c| c.samples).sum();
    let total_tokens: u64 = per_iteration_costs.iter().map(|c| c.total_tokens).sum();
    let total_cost = round6(per_iteration_costs.iter().map(|c| c.total_cost).sum());

    let average_cost_per_iteration = if n == 0 {
        0.0
    } else {
        round6(total_cost / n as f64)
    };

    FinalCost {
        test_set_name: test_set_name.to_string(),
        iterations: n as u32,
        aggregate_stats: AggregateCostStats {
            total_samples,
            total_tokens,
            total_cost,
            average_cost_per_iteration,
        },
        per_iteration_costs,
        generated_at: Utc::now(),
    }
}
