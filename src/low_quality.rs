//! Post-hoc distribution analysis of low-scoring records.
//!
//! Records scoring 3 or below on either dimension are bucketed into fixed
//! reason categories. The output is presentation data for human review; no
//! control decision in the harness reads it.

use crate::comparison::ComparisonRecord;
use crate::metrics::round4;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scores at or below this value count as low quality.
const LOW_SCORE_CUTOFF: u8 = 3;

/// Maximum example records carried per bucket.
const MAX_EXAMPLES_PER_BUCKET: usize = 5;

/// An example record illustrating one bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketExample {
    /// Item identifier of the offending record
    pub item_id: String,

    /// The question asked
    pub question: String,

    /// The score that landed the record in this bucket
    pub score: u8,

    /// The judge's reasoning for that score
    pub reasoning: String,
}

/// One fixed reason category with its share of the record set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonBucket {
    /// Short category label
    pub label: String,

    /// Static description of what the category means
    pub description: String,

    /// Records falling in this bucket
    pub count: usize,

    /// `count / total_samples`, 0 when there are no samples
    pub percentage: f64,

    /// Up to [`MAX_EXAMPLES_PER_BUCKET`] illustrative records
    pub examples: Vec<BucketExample>,
}

/// Distribution analysis over an iteration's low-scoring records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowQualityReport {
    /// Total records analyzed
    pub total_samples: usize,

    /// Records low on either dimension
    pub total_low_quality: usize,

    /// `total_low_quality / total_samples`, 0 when there are no samples
    pub low_quality_rate: f64,

    /// Faithfulness buckets (scores 1-3)
    pub faithfulness_buckets: Vec<ReasonBucket>,

    /// Completeness buckets (scores 1-3)
    pub completeness_buckets: Vec<ReasonBucket>,

    /// Free-text observations about the dominant failure modes
    pub insights: Vec<String>,

    /// When the analysis ran
    pub generated_at: DateTime<Utc>,
}

/// Fixed category definitions for a dimension: (score, label, description).
type BucketDef = (u8, &'static str, &'static str);

const FAITHFULNESS_BUCKETS: [BucketDef; 3] = [
    (
        1,
        "completely false",
        "The answer contradicts or fabricates beyond the provided context",
    ),
    (
        2,
        "mostly false",
        "Most claims in the answer are not supported by the context",
    ),
    (
        3,
        "mixed",
        "The answer mixes supported and unsupported claims",
    ),
];

const COMPLETENESS_BUCKETS: [BucketDef; 3] = [
    (
        1,
        "missing",
        "The answer does not address the question at all",
    ),
    (
        2,
        "mostly incomplete",
        "The answer addresses only a small part of the question",
    ),
    (
        3,
        "partially complete",
        "The answer covers the question but omits significant aspects",
    ),
];

/// Analyze an iteration's records for low-quality distribution.
///
/// Zero-sample safe: an empty record set yields empty buckets with all rates 0.
#[must_use]
pub fn analyze_low_quality(records: &[ComparisonRecord]) -> LowQualityReport {
    let total_samples = records.len();

    let build_buckets = |defs: &[BucketDef], score_of: fn(&ComparisonRecord) -> (u8, &str)| {
        defs.iter()
            .map(|&(bucket_score, label, description)| {
                let matching: Vec<&ComparisonRecord> = records
                    .iter()
                    .filter(|r| score_of(r).0 == bucket_score)
                    .collect();

                let examples = matching
                    .iter()
                    .take(MAX_EXAMPLES_PER_BUCKET)
                    .map(|r| {
                        let (score, reasoning) = score_of(r);
                        BucketExample {
                            item_id: r.item_id.clone(),
                            question: r.question.clone(),
                            score,
                            reasoning: reasoning.to_string(),
                        }
                    })
                    .collect();

                let count = matching.len();
                let percentage = if total_samples == 0 {
                    0.0
                } else {
                    round4(count as f64 / total_samples as f64)
                };

                ReasonBucket {
                    label: label.to_string(),
                    description: description.to_string(),
                    count,
                    percentage,
                    examples,
                }
            })
            .collect::<Vec<_>>()
    };

    let faithfulness_buckets = build_buckets(&FAITHFULNESS_BUCKETS, |r| {
        (
            r.verdict.faithfulness.score,
            r.verdict.faithfulness.reasoning.as_str(),
        )
    });
    let completeness_buckets = build_buckets(&COMPLETENESS_BUCKETS, |r| {
        (
            r.verdict.completeness.score,
            r.verdict.completeness.reasoning.as_str(),
        )
    });

    let total_low_quality = records
        .iter()
        .filter(|r| {
            r.verdict.faithfulness.score <= LOW_SCORE_CUTOFF
                || r.verdict.completeness.score <= LOW_SCORE_CUTOFF
        })
        .count();

    let low_quality_rate = if total_samples == 0 {
        0.0
    } else {
        round4(total_low_quality as f64 / total_samples as f64)
    };

    let insights = build_insights(
        total_samples,
        total_low_quality,
        &faithfulness_buckets,
        &completeness_buckets,
    );

    LowQualityReport {
        total_samples,
        total_low_quality,
        low_quality_rate,
        faithfulness_buckets,
        completeness_buckets,
        insights,
        generated_at: Utc::now(),
    }
}

fn build_insights(
    total_samples: usize,
    total_low_quality: usize,
    faithfulness_buckets: &[ReasonBucket],
    completeness_buckets: &[ReasonBucket],
) -> Vec<String> {
    if total_samples == 0 {
        return vec!["No records to analyze".to_string()];
    }
    if total_low_quality == 0 {
        return vec![format!(
            "All {total_samples} answers scored above the low-quality cutoff on both dimensions"
        )];
    }

    let mut insights = vec![format!(
        "{total_low_quality} of {total_samples} answers scored low on at least one dimension"
    )];

    let dominant = |buckets: &[ReasonBucket], dimension: &str| {
        buckets
            .iter()
            .max_by_key(|b| b.count)
            .filter(|b| b.count > 0)
            .map(|b| {
                format!(
                    "Dominant {dimension} failure: \"{}\" ({} records, {:.1}% of samples)",
                    b.label,
                    b.count,
                    b.percentage * 100.0
                )
            })
    };

    insights.extend(dominant(faithfulness_buckets, "faithfulness"));
    insights.extend(dominant(completeness_buckets, "completeness"));
    insights
}
