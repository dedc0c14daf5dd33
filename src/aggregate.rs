//! Run-level aggregation across iterations.

use crate::config::EvaluationConfig;
use crate::cost::{calculate_final_cost, FinalCost};
use crate::metrics::{calculate_final_metrics, FinalMetrics};
use crate::store::ResultStore;
use anyhow::{Context, Result};
use tracing::info;

/// Combines every iteration's statistics into run-level summaries.
///
/// Invoked once all `config.iterations` iterations have independently
/// completed; a missing iteration artifact is an error, not a partial
/// aggregate.
pub struct FinalAggregator {
    results: ResultStore,
    config: EvaluationConfig,
    test_set_name: String,
}

impl FinalAggregator {
    /// Create an aggregator for one test set.
    pub fn new(
        results: ResultStore,
        config: EvaluationConfig,
        test_set_name: impl Into<String>,
    ) -> Self {
        Self {
            results,
            config,
            test_set_name: test_set_name.into(),
        }
    }

    /// Load all per-iteration metrics and costs, aggregate, and persist both
    /// run-level files.
    pub async fn finalize_run(&self) -> Result<(FinalMetrics, FinalCost)> {
        let mut per_iteration_metrics = Vec::with_capacity(self.config.iterations as usize);
        let mut per_iteration_costs = Vec::with_capacity(self.config.iterations as usize);

        for iteration in 1..=self.config.iterations {
            let (metrics, cost) = futures::future::try_join(
                self.results.load_metrics(&self.test_set_name, iteration),
                self.results.load_cost(&self.test_set_name, iteration),
            )
            .await
            .with_context(|| {
                format!("Cannot finalize run: artifacts missing for iteration {iteration}")
            })?;
            per_iteration_metrics.push(metrics);
            per_iteration_costs.push(cost);
        }

        let final_metrics = calculate_final_metrics(&self.test_set_name, per_iteration_metrics);
        let final_cost = calculate_final_cost(&self.test_set_name, per_iteration_costs);

        self.results
            .save_final_metrics(&self.test_set_name, &final_metrics)
            .await?;
        self.results
            .save_final_cost(&self.test_set_name, &final_cost)
            .await?;

        info!(
            test_set = %self.test_set_name,
            iterations = final_metrics.iterations,
            mean_faithfulness = final_metrics.aggregate_metrics.average_faithfulness_score.mean,
            total_cost = final_cost.aggregate_stats.total_cost,
            "Run finalized"
        );

        Ok((final_metrics, final_cost))
    }
}
