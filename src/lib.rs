//! # rag-evals
//!
//! Resumable LLM-as-judge evaluation harness for RAG answer datasets.
//!
//! A batch runner scores a pre-generated question/answer test set against an
//! automated judge, checkpointing progress after every item so a crash never
//! re-does completed work, then aggregates per-item verdicts into iteration-
//! and run-level quality and cost statistics.
//!
//! The crate deliberately does not talk to any LLM itself: the judge is an
//! injected [`judge::JudgeEvaluator`] implementation, and file persistence
//! goes through the [`store::FileStore`] seam. Both are plain trait objects
//! handed to the constructors - no runtime container, no global state.
//!
//! ## Example
//!
//! ```no_run
//! use rag_evals::{
//!     EvaluationConfig, FinalAggregator, IterationRunner, LocalFileStore, PassPolicy,
//!     PricingTable, ResultStore, TestSet,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(judge: Arc<dyn rag_evals::JudgeEvaluator>) -> anyhow::Result<()> {
//! let test_set = TestSet::load("datasets/course-qa.json")?;
//!
//! let config = EvaluationConfig {
//!     output_directory: "results".into(),
//!     judge_model: "gpt-4o".to_string(),
//!     judge_provider: "openai".to_string(),
//!     iterations: 3,
//!     prompt_version: "v2".to_string(),
//!     pass_policy: PassPolicy::default(),
//! };
//!
//! let results = ResultStore::new(Arc::new(LocalFileStore), &config.output_directory);
//! let runner = IterationRunner::new(
//!     judge,
//!     results.clone(),
//!     PricingTable::with_default_models(),
//!     config.clone(),
//!     &test_set.name,
//! );
//!
//! for iteration in 1..=config.iterations {
//!     let records = runner.run_iteration(iteration, &test_set.cases).await?;
//!     println!("iteration {iteration}: {} records", records.len());
//! }
//!
//! let aggregator = FinalAggregator::new(results, config, &test_set.name);
//! let (final_metrics, final_cost) = aggregator.finalize_run().await?;
//! println!(
//!     "mean faithfulness {:.2}, total cost ${:.4}",
//!     final_metrics.aggregate_metrics.average_faithfulness_score.mean,
//!     final_cost.aggregate_stats.total_cost,
//! );
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod comparison;
pub mod config;
pub mod cost;
pub mod dataset;
pub mod identity;
pub mod judge;
pub mod low_quality;
pub mod metrics;
pub mod progress;
pub mod runner;
pub mod store;

pub use aggregate::FinalAggregator;
pub use comparison::{build_comparison, ComparisonRecord};
pub use config::{EvaluationConfig, PassPolicy};
pub use cost::{
    calculate_final_cost, calculate_iteration_cost, FinalCost, IterationCost, PricingTable,
    ProviderPricing,
};
pub use dataset::{ContextItem, TestCase, TestSet};
pub use identity::item_key;
pub use judge::{DimensionScore, JudgeEvaluator, JudgeResult, UsageEntry, Verdict};
pub use low_quality::{analyze_low_quality, LowQualityReport, ReasonBucket};
pub use metrics::{
    calculate_final_metrics, calculate_iteration_metrics, FinalMetrics, IterationMetrics, RateStat,
    ScoreStat,
};
pub use progress::{ItemOutcome, ProgressEntry, ProgressFile, ProgressStatistics};
pub use runner::IterationRunner;
pub use store::{FileStore, LocalFileStore, ResultStore};
