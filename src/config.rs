//! Run configuration for the evaluation harness.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pass/fail policy applied to a judged item.
///
/// The policy is explicit configuration rather than a hard-coded threshold so
/// that different test sets can tune what "acceptable" means, and so the
/// predicate is directly testable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PassPolicy {
    /// Both sub-scores must reach the minimum (default: 4 on the 1-5 scale).
    BothAtLeast {
        /// Minimum score each dimension must reach
        min: u8,
    },

    /// The mean of the two sub-scores must reach the minimum.
    OverallAtLeast {
        /// Minimum mean score
        min: f64,
    },
}

impl Default for PassPolicy {
    fn default() -> Self {
        Self::BothAtLeast { min: 4 }
    }
}

impl PassPolicy {
    /// Evaluate the predicate against the two sub-scores of a verdict.
    #[must_use]
    pub fn is_pass(&self, faithfulness_score: u8, completeness_score: u8) -> bool {
        match *self {
            Self::BothAtLeast { min } => faithfulness_score >= min && completeness_score >= min,
            Self::OverallAtLeast { min } => {
                let mean = f64::from(u16::from(faithfulness_score) + u16::from(completeness_score))
                    / 2.0;
                mean >= min
            }
        }
    }
}

/// Immutable configuration for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Root directory all artifacts are written under
    pub output_directory: PathBuf,

    /// Base name of the judge model (e.g., "gpt-4o")
    pub judge_model: String,

    /// Provider serving the judge model (e.g., "openai")
    pub judge_provider: String,

    /// Number of independent iterations requested for this run
    pub iterations: u32,

    /// Version label of the judging prompt, recorded in every artifact
    pub prompt_version: String,

    /// Pass/fail predicate applied to each verdict
    #[serde(default)]
    pub pass_policy: PassPolicy,
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_at_least_requires_both_dimensions() {
        let policy = PassPolicy::default();
        assert!(policy.is_pass(4, 4));
        assert!(policy.is_pass(5, 4));
        assert!(!policy.is_pass(5, 3));
        assert!(!policy.is_pass(3, 5));
    }

    #[test]
    fn test_overall_at_least_uses_the_mean() {
        let policy = PassPolicy::OverallAtLeast { min: 4.0 };
        // 5 and 3 average to exactly 4.0.
        assert!(policy.is_pass(5, 3));
        assert!(!policy.is_pass(4, 3));
    }

    #[test]
    fn test_pass_policy_default_deserializes_when_absent() {
        let json = r#"{
            "output_directory": "results",
            "judge_model": "gpt-4o",
            "judge_provider": "openai",
            "iterations": 3,
            "prompt_version": "v2"
        }"#;
        let config: EvaluationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pass_policy, PassPolicy::BothAtLeast { min: 4 });
        assert_eq!(config.iterations, 3);
    }

    #[test]
    fn test_pass_policy_round_trips_through_json() {
        let policy = PassPolicy::OverallAtLeast { min: 3.5 };
        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("overall_at_least"));
        let back: PassPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }
}
