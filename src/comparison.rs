//! Building persisted comparison records from raw judge verdicts.

use crate::config::PassPolicy;
use crate::dataset::TestCase;
use crate::judge::{JudgeResult, UsageEntry, Verdict};
use crate::metrics::round2;
use serde::{Deserialize, Serialize};

/// The authoritative per-item output of an iteration.
///
/// Derived deterministically from a test case plus a verdict; created once,
/// appended to the iteration's record set, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// Item identifier, copied from the test case
    pub item_id: String,

    /// The question that was asked
    pub question: String,

    /// The system's generated answer that was judged
    pub system_answer: String,

    /// The judge's full verdict including reasoning
    pub verdict: Verdict,

    /// Mean of the two sub-scores, rounded to 2 decimals
    pub overall_score: f64,

    /// Result of the configured pass policy
    pub passed: bool,

    /// Number of context chunks the answer was generated from
    pub context_size: usize,

    /// Token usage incurred judging this item
    pub token_usage: Vec<UsageEntry>,
}

/// Package a judge result into a comparison record.
///
/// Pure and synchronous: `overall_score` is the arithmetic mean of the two
/// sub-scores with a single rounding at the end, `passed` is the configured
/// policy applied to the raw sub-scores.
#[must_use]
pub fn build_comparison(
    test_case: &TestCase,
    judge_result: JudgeResult,
    pass_policy: PassPolicy,
) -> ComparisonRecord {
    let JudgeResult {
        verdict,
        token_usage,
    } = judge_result;

    let passed = pass_policy.is_pass(verdict.faithfulness.score, verdict.completeness.score);
    let overall_score = round2(verdict.mean_score());

    ComparisonRecord {
        item_id: test_case.item_id.clone(),
        question: test_case.question.clone(),
        system_answer: test_case.answer.clone(),
        verdict,
        overall_score,
        passed,
        context_size: test_case.context.len(),
        token_usage,
    }
}
