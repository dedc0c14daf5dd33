//! Judge verdict types and the evaluator seam.
//!
//! The concrete judge (prompt construction, LLM transport, schema coercion)
//! lives outside this crate. The harness consumes it through the
//! [`JudgeEvaluator`] trait, injected at construction - any failure the judge
//! surfaces is fatal for the current iteration and propagates unchanged.

use crate::dataset::TestCase;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Score and rationale for one quality dimension, on a 1-5 scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DimensionScore {
    /// Score from 1 (worst) to 5 (best)
    pub score: u8,

    /// The judge's reasoning behind the score
    pub reasoning: String,
}

impl DimensionScore {
    /// Create a dimension score.
    #[must_use]
    pub fn new(score: u8, reasoning: impl Into<String>) -> Self {
        Self {
            score,
            reasoning: reasoning.into(),
        }
    }
}

/// A judge's verdict on one answer. Produced once per item, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verdict {
    /// Is the answer grounded in the provided context?
    pub faithfulness: DimensionScore,

    /// Does the answer cover everything the question asks for?
    pub completeness: DimensionScore,
}

impl Verdict {
    /// Arithmetic mean of the two sub-scores (unrounded).
    #[must_use]
    pub fn mean_score(&self) -> f64 {
        f64::from(u16::from(self.faithfulness.score) + u16::from(self.completeness.score)) / 2.0
    }
}

/// Token accounting for one model call made while judging an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageEntry {
    /// Base model name the tokens were spent on
    pub model: String,

    /// Prompt tokens
    pub input_tokens: u32,

    /// Completion tokens
    pub output_tokens: u32,
}

impl UsageEntry {
    /// Create a usage entry.
    #[must_use]
    pub fn new(model: impl Into<String>, input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            model: model.into(),
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens (input + output).
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Everything the judge returns for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeResult {
    /// The verdict on the answer
    pub verdict: Verdict,

    /// Token usage incurred producing the verdict
    pub token_usage: Vec<UsageEntry>,
}

/// The evaluator seam the harness drives.
///
/// Implementations score one item at a time. The harness performs no retry:
/// an `Err` aborts the current iteration with all prior progress already
/// checkpointed.
#[async_trait]
pub trait JudgeEvaluator: Send + Sync {
    /// Score one test case, returning the verdict and usage accounting.
    async fn evaluate(&self, test_case: &TestCase) -> Result<JudgeResult>;
}
