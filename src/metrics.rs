//! Per-iteration and run-level quality statistics.
//!
//! All means accumulate in integer space and divide exactly once, with a
//! single rounding at the end. The same input record set always produces
//! bit-identical output, so repeated runs over identical records diff clean.

use crate::comparison::ComparisonRecord;
use crate::config::EvaluationConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Round a value to 2 decimal places. The single rounding step for scores.
#[must_use]
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round a value to 4 decimal places. The single rounding step for rates.
#[must_use]
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// A mean score carried with its value only (not a full distribution).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreStat {
    /// Mean value, rounded to 2 decimals
    pub value: f64,
}

/// A rate carried with the integers it was computed from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateStat {
    /// `numerator / denominator`, or 0 when the denominator is 0
    pub value: f64,

    /// Count of items satisfying the predicate
    pub numerator: usize,

    /// Total count
    pub denominator: usize,
}

impl RateStat {
    /// Compute a rate, yielding 0 (never NaN) for an empty denominator.
    #[must_use]
    pub fn compute(numerator: usize, denominator: usize) -> Self {
        let value = if denominator == 0 {
            0.0
        } else {
            round4(numerator as f64 / denominator as f64)
        };
        Self {
            value,
            numerator,
            denominator,
        }
    }
}

/// Quality statistics for one completed iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationMetrics {
    /// Which iteration these statistics describe
    pub iteration_number: u32,

    /// Test set the iteration ran against
    pub test_set_name: String,

    /// Judge model label, from configuration
    pub judge_model: String,

    /// Judge provider label, from configuration
    pub judge_provider: String,

    /// Judging prompt version, from configuration
    pub prompt_version: String,

    /// Number of records aggregated
    pub sample_count: usize,

    /// Mean faithfulness score across all records
    pub average_faithfulness_score: ScoreStat,

    /// Mean completeness score across all records
    pub average_completeness_score: ScoreStat,

    /// Fraction of records that passed the configured policy
    pub overall_pass_rate: RateStat,

    /// When these statistics were computed
    pub generated_at: DateTime<Utc>,
}

/// Compute the quality statistics for one iteration's record set.
///
/// Zero-sample safe: an empty record set yields `sample_count = 0` and all
/// values 0, never NaN.
#[must_use]
pub fn calculate_iteration_metrics(
    iteration_number: u32,
    test_set_name: &str,
    records: &[ComparisonRecord],
    config: &EvaluationConfig,
) -> IterationMetrics {
    let sample_count = records.len();

    // Sub-scores are small integers; sum exactly, divide once.
    let faithfulness_sum: u64 = records
        .iter()
        .map(|r| u64::from(r.verdict.faithfulness.score))
        .sum();
    let completeness_sum: u64 = records
        .iter()
        .map(|r| u64::from(r.verdict.completeness.score))
        .sum();
    let passed_count = records.iter().filter(|r| r.passed).count();

    let mean = |sum: u64| {
        if sample_count == 0 {
            0.0
        } else {
            round2(sum as f64 / sample_count as f64)
        }
    };

    IterationMetrics {
        iteration_number,
        test_set_name: test_set_name.to_string(),
        judge_model: config.judge_model.clone(),
        judge_provider: config.judge_provider.clone(),
        prompt_version: config.prompt_version.clone(),
        sample_count,
        average_faithfulness_score: ScoreStat {
            value: mean(faithfulness_sum),
        },
        average_completeness_score: ScoreStat {
            value: mean(completeness_sum),
        },
        overall_pass_rate: RateStat::compute(passed_count, sample_count),
        generated_at: Utc::now(),
    }
}

/// Run-level aggregate of one statistic: the mean of per-iteration means.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AggregateStat {
    /// Mean of the per-iteration values
    pub mean: f64,
}

/// The three aggregate statistics of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Mean of per-iteration faithfulness means
    pub average_faithfulness_score: AggregateStat,

    /// Mean of per-iteration completeness means
    pub average_completeness_score: AggregateStat,

    /// Mean of per-iteration pass rates
    pub overall_pass_rate: AggregateStat,
}

/// Run-level quality statistics across all iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalMetrics {
    /// Test set the run evaluated
    pub test_set_name: String,

    /// Number of iterations aggregated
    pub iterations: u32,

    /// Mean-of-means aggregates
    pub aggregate_metrics: AggregateMetrics,

    /// Per-iteration statistics echoed verbatim for traceability
    pub per_iteration_metrics: Vec<IterationMetrics>,

    /// When the aggregate was computed
    pub generated_at: DateTime<Utc>,
}

/// Aggregate per-iteration statistics into run-level statistics.
///
/// Operates on the per-iteration means, not raw records - a mean of means.
/// The per-iteration inputs are echoed back unchanged.
#[must_use]
pub fn calculate_final_metrics(
    test_set_name: &str,
    per_iteration_metrics: Vec<IterationMetrics>,
) -> FinalMetrics {
    let n = per_iteration_metrics.len();

    let mean_of = |extract: fn(&IterationMetrics) -> f64| {
        if n == 0 {
            0.0
        } else {
            round2(per_iteration_metrics.iter().map(extract).sum::<f64>() / n as f64)
        }
    };

    FinalMetrics {
        test_set_name: test_set_name.to_string(),
        iterations: n as u32,
        aggregate_metrics: AggregateMetrics {
            average_faithfulness_score: AggregateStat {
                mean: mean_of(|m| m.average_faithfulness_score.value),
            },
            average_completeness_score: AggregateStat {
                mean: mean_of(|m| m.average_completeness_score.value),
            },
            overall_pass_rate: AggregateStat {
                mean: mean_of(|m| m.overall_pass_rate.value),
            },
        },
        per_iteration_metrics,
        generated_at: Utc::now(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PassPolicy;
    use crate::dataset::TestCase;
    use crate::judge::{DimensionScore, JudgeResult, Verdict};
    use std::path::PathBuf;

    fn config() -> EvaluationConfig {
        EvaluationConfig {
            output_directory: PathBuf::from("results"),
            judge_model: "gpt-4o".to_string(),
            judge_provider: "openai".to_string(),
            iterations: 2,
            prompt_version: "v2".to_string(),
            pass_policy: PassPolicy::default(),
        }
    }

    fn record(item_id: &str, faithfulness: u8, completeness: u8) -> ComparisonRecord {
        let test_case = TestCase {
            item_id: item_id.to_string(),
            question: "q".to_string(),
            answer: "a".to_string(),
            context: vec![],
            duration_ms: 0,
        };
        crate::comparison::build_comparison(
            &test_case,
            JudgeResult {
                verdict: Verdict {
                    faithfulness: DimensionScore::new(faithfulness, ""),
                    completeness: DimensionScore::new(completeness, ""),
                },
                token_usage: vec![],
            },
            PassPolicy::default(),
        )
    }

    #[test]
    fn test_iteration_means_are_exact() {
        let records = vec![record("a", 5, 4), record("b", 3, 2)];
        let metrics = calculate_iteration_metrics(1, "set-1", &records, &config());

        assert_eq!(metrics.sample_count, 2);
        assert!((metrics.average_faithfulness_score.value - 4.0).abs() < f64::EPSILON);
        assert!((metrics.average_completeness_score.value - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pass_rate_carries_its_integers() {
        // (5,4) passes the default policy, (3,2) does not.
        let records = vec![record("a", 5, 4), record("b", 3, 2)];
        let metrics = calculate_iteration_metrics(1, "set-1", &records, &config());

        assert!((metrics.overall_pass_rate.value - 0.5).abs() < f64::EPSILON);
        assert_eq!(metrics.overall_pass_rate.numerator, 1);
        assert_eq!(metrics.overall_pass_rate.denominator, 2);
    }

    #[test]
    fn test_empty_record_set_is_all_zeros() {
        let metrics = calculate_iteration_metrics(1, "set-1", &[], &config());
        assert_eq!(metrics.sample_count, 0);
        assert_eq!(metrics.average_faithfulness_score.value, 0.0);
        assert_eq!(metrics.average_completeness_score.value, 0.0);
        assert_eq!(metrics.overall_pass_rate.value, 0.0);
        assert_eq!(metrics.overall_pass_rate.denominator, 0);
    }

    #[test]
    fn test_identical_inputs_produce_identical_statistics() {
        let records = vec![record("a", 5, 3), record("b", 4, 4), record("c", 1, 2)];
        let first = calculate_iteration_metrics(1, "set-1", &records, &config());
        let second = calculate_iteration_metrics(1, "set-1", &records, &config());

        assert_eq!(
            first.average_faithfulness_score.value.to_bits(),
            second.average_faithfulness_score.value.to_bits()
        );
        assert_eq!(
            first.overall_pass_rate.value.to_bits(),
            second.overall_pass_rate.value.to_bits()
        );
    }

    #[test]
    fn test_final_metrics_is_a_mean_of_means() {
        let iteration = |n: u32, faithfulness: f64| {
            let mut metrics = calculate_iteration_metrics(n, "set-1", &[], &config());
            metrics.average_faithfulness_score = ScoreStat {
                value: faithfulness,
            };
            metrics
        };
        let final_metrics =
            calculate_final_metrics("set-1", vec![iteration(1, 5.0), iteration(2, 4.0)]);

        assert_eq!(final_metrics.iterations, 2);
        assert!(
            (final_metrics
                .aggregate_metrics
                .average_faithfulness_score
                .mean
                - 4.5)
                .abs()
                < f64::EPSILON
        );
        assert_eq!(final_metrics.per_iteration_metrics.len(), 2);
        assert_eq!(final_metrics.per_iteration_metrics[0].iteration_number, 1);
    }

    #[test]
    fn test_final_metrics_with_no_iterations_is_zero() {
        let final_metrics = calculate_final_metrics("set-1", vec![]);
        assert_eq!(final_metrics.iterations, 0);
        assert_eq!(
            final_metrics
                .aggregate_metrics
                .average_faithfulness_score
                .mean,
            0.0
        );
    }
}
