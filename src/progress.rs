//! Progress checkpoint documents.
//!
//! The progress file is the single source of truth for resumability of one
//! iteration. It is rewritten wholesale after every completed item, so a crash
//! at any point loses at most the item in flight. Entries carry a reduced
//! outcome summary only - the full comparison record lives in the records
//! file, written once at iteration end.

use crate::comparison::ComparisonRecord;
use crate::identity::item_key;
use crate::metrics::round2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reduced outcome summary for one completed item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Faithfulness sub-score
    pub faithfulness_score: u8,

    /// Completeness sub-score
    pub completeness_score: u8,

    /// Whether the item passed the configured policy
    pub passed: bool,
}

/// One completed item. Presence of an entry means "do not re-evaluate".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// Item identifier, matched via its identity key on resume
    pub item_id: String,

    /// Reduced outcome summary
    pub result: ItemOutcome,

    /// When the item finished
    pub completed_at: DateTime<Utc>,
}

impl ProgressEntry {
    /// Build an entry from a freshly created comparison record.
    #[must_use]
    pub fn from_record(record: &ComparisonRecord) -> Self {
        Self {
            item_id: record.item_id.clone(),
            result: ItemOutcome {
                faithfulness_score: record.verdict.faithfulness.score,
                completeness_score: record.verdict.completeness.score,
                passed: record.passed,
            },
            completed_at: Utc::now(),
        }
    }
}

/// Completion bookkeeping recomputed on every checkpoint write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProgressStatistics {
    /// Size of the current test-case list
    pub total_questions: usize,

    /// Items completed so far (matched against the current list)
    pub completed_questions: usize,

    /// Items still to evaluate
    pub pending_questions: usize,

    /// `completed / total * 100`, rounded to 2 decimals, 0 when total is 0
    pub completion_percentage: f64,
}

impl ProgressStatistics {
    /// Compute statistics for `completed` finished items out of `total`.
    #[must_use]
    pub fn compute(total: usize, completed: usize) -> Self {
        let completion_percentage = if total == 0 {
            0.0
        } else {
            round2(completed as f64 / total as f64 * 100.0)
        };
        Self {
            total_questions: total,
            completed_questions: completed,
            pending_questions: total.saturating_sub(completed),
            completion_percentage,
        }
    }
}

/// The per-iteration checkpoint document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressFile {
    /// Test set this iteration belongs to
    pub test_set_name: String,

    /// Which iteration is checkpointed
    pub iteration_number: u32,

    /// Completion bookkeeping
    pub statistics: ProgressStatistics,

    /// One entry per completed item, in completion order
    pub entries: Vec<ProgressEntry>,
}

impl ProgressFile {
    /// Start an empty checkpoint for an iteration over `total_questions` items.
    #[must_use]
    pub fn new(test_set_name: impl Into<String>, iteration_number: u32, total_questions: usize) -> Self {
        Self {
            test_set_name: test_set_name.into(),
            iteration_number,
            statistics: ProgressStatistics::compute(total_questions, 0),
            entries: Vec::new(),
        }
    }

    /// Identity keys of every completed item, for set-difference partitioning.
    #[must_use]
    pub fn completed_keys(&self) -> HashSet<String> {
        self.entries.iter().map(|e| item_key(&e.item_id)).collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(item_id: &str) -> ProgressEntry {
        ProgressEntry {
            item_id: item_id.to_string(),
            result: ItemOutcome {
                faithfulness_score: 4,
                completeness_score: 5,
                passed: true,
            },
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_statistics_arithmetic() {
        let stats = ProgressStatistics::compute(8, 2);
        assert_eq!(stats.total_questions, 8);
        assert_eq!(stats.completed_questions, 2);
        assert_eq!(stats.pending_questions, 6);
        assert!((stats.completion_percentage - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_statistics_zero_total_is_safe() {
        let stats = ProgressStatistics::compute(0, 0);
        assert_eq!(stats.completion_percentage, 0.0);
        assert_eq!(stats.pending_questions, 0);
    }

    #[test]
    fn test_statistics_completed_beyond_total_saturates() {
        // Test set shrank between runs; pending must not underflow.
        let stats = ProgressStatistics::compute(2, 3);
        assert_eq!(stats.pending_questions, 0);
    }

    #[test]
    fn test_completed_keys_match_identity_hashing() {
        let mut progress = ProgressFile::new("set-1", 1, 3);
        progress.entries.push(entry("qa_001"));
        progress.entries.push(entry("qa_002"));

        let keys = progress.completed_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&item_key("qa_001")));
        assert!(!keys.contains(&item_key("qa_003")));
    }

    #[test]
    fn test_progress_file_serde_round_trip() {
        let mut progress = ProgressFile::new("set-1", 2, 1);
        progress.entries.push(entry("qa_001"));
        progress.statistics = ProgressStatistics::compute(1, 1);

        let json = serde_json::to_string_pretty(&progress).unwrap();
        let back: ProgressFile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.iteration_number, 2);
        assert_eq!(back.entries.len(), 1);
        assert_eq!(back.statistics, progress.statistics);
    }
}
