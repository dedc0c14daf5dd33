//! The resumable iteration state machine.
//!
//! One iteration walks the test-case list strictly in input order, one item at
//! a time: judge call, record build, progress rewrite. Sequential processing
//! is the correctness mechanism, not a simplification - the checkpoint after
//! each item is what bounds the work a crash can lose, and parallel judging
//! would break the persist-before-next invariant.
//!
//! Failure handling is fail-fast: a judge or filesystem error aborts the
//! iteration with the progress file reflecting every item completed before
//! the failure, and no records file is written. A later call resumes from the
//! checkpoint and evaluates only the gap.

use crate::comparison::{build_comparison, ComparisonRecord};
use crate::config::EvaluationConfig;
use crate::cost::{calculate_iteration_cost, PricingTable};
use crate::dataset::TestCase;
use crate::identity::item_key;
use crate::judge::JudgeEvaluator;
use crate::low_quality::analyze_low_quality;
use crate::metrics::calculate_iteration_metrics;
use crate::progress::{ProgressEntry, ProgressFile, ProgressStatistics};
use crate::store::ResultStore;
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives one iteration of a test set end to end, resumably.
pub struct IterationRunner {
    judge: Arc<dyn JudgeEvaluator>,
    results: ResultStore,
    pricing: PricingTable,
    config: EvaluationConfig,
    test_set_name: String,
    analyze_low_quality: bool,
}

impl IterationRunner {
    /// Create a runner for one test set.
    ///
    /// All collaborators are injected explicitly; the runner holds no global
    /// state and owns iteration state only for the duration of one call.
    pub fn new(
        judge: Arc<dyn JudgeEvaluator>,
        results: ResultStore,
        pricing: PricingTable,
        config: EvaluationConfig,
        test_set_name: impl Into<String>,
    ) -> Self {
        Self {
            judge,
            results,
            pricing,
            config,
            test_set_name: test_set_name.into(),
            analyze_low_quality: true,
        }
    }

    /// Enable or disable the post-iteration low-quality analysis.
    #[must_use]
    pub fn with_low_quality_analysis(mut self, enabled: bool) -> Self {
        self.analyze_low_quality = enabled;
        self
    }

    /// Run (or resume) one iteration, returning its comparison records.
    ///
    /// Behavior per state:
    /// - Records file already covers every test case: load and return it, no
    ///   judge calls.
    /// - Progress checkpoint present: evaluate only items not in it.
    /// - Judge error on any item: propagate immediately; the checkpoint keeps
    ///   all prior completions, no records file is written.
    ///
    /// Resume asymmetry: progress entries carry a reduced summary, not the
    /// full record. If the prior attempt crashed before the records file was
    /// written, the checkpointed items cannot be reconstructed and the return
    /// value covers only the newly evaluated subset.
    pub async fn run_iteration(
        &self,
        iteration_number: u32,
        test_cases: &[TestCase],
    ) -> Result<Vec<ComparisonRecord>> {
        self.results
            .ensure_directory_structure(&self.test_set_name)
            .await?;

        // Fast path: a finished iteration is never re-judged.
        let existing_records = self.load_existing_records(iteration_number, test_cases).await?;
        if let Some(records) = &existing_records {
            let covered: HashSet<&str> = records.iter().map(|r| r.item_id.as_str()).collect();
            if test_cases.iter().all(|tc| covered.contains(tc.item_id.as_str())) {
                info!(
                    iteration = iteration_number,
                    records = records.len(),
                    "Records file already covers the test set, skipping evaluation"
                );
                return Ok(records.clone());
            }
        }

        let mut progress = self.load_or_start_progress(iteration_number, test_cases).await?;

        // Partition by identity key. Progress entries that match nothing in
        // the current list are tolerated (test sets get edited between runs).
        let completed_keys = progress.completed_keys();
        let current_keys: HashSet<String> =
            test_cases.iter().map(|tc| item_key(&tc.item_id)).collect();
        let stale = completed_keys.len() - completed_keys.intersection(&current_keys).count();
        if stale > 0 {
            warn!(
                iteration = iteration_number,
                stale_entries = stale,
                "Progress file references items not in the current test set, ignoring them"
            );
        }

        let (already_done, pending): (Vec<&TestCase>, Vec<&TestCase>) = test_cases
            .iter()
            .partition(|tc| completed_keys.contains(&item_key(&tc.item_id)));

        info!(
            iteration = iteration_number,
            test_set = %self.test_set_name,
            total = test_cases.len(),
            already_done = already_done.len(),
            pending = pending.len(),
            "Starting iteration"
        );

        // Sequential by design; each completed item is checkpointed before
        // the next judge call.
        let mut new_records = Vec::with_capacity(pending.len());
        for (idx, test_case) in pending.iter().enumerate() {
            debug!(
                iteration = iteration_number,
                progress = idx + 1,
                pending = pending.len(),
                item_id = %test_case.item_id,
                "Judging item"
            );

            let judge_result = self
                .judge
                .evaluate(test_case)
                .await
                .with_context(|| format!("Judge evaluation failed for item {}", test_case.item_id))?;

            let record = build_comparison(test_case, judge_result, self.config.pass_policy);
            progress.entries.push(ProgressEntry::from_record(&record));
            progress.statistics =
                ProgressStatistics::compute(test_cases.len(), already_done.len() + idx + 1);
            self.results
                .save_progress(&self.test_set_name, iteration_number, &progress)
                .await?;

            new_records.push(record);
        }

        let combined = self.combine_records(test_cases, existing_records, new_records);

        self.results
            .save_records(&self.test_set_name, iteration_number, &combined)
            .await?;

        let metrics = calculate_iteration_metrics(
            iteration_number,
            &self.test_set_name,
            &combined,
            &self.config,
        );
        self.results
            .save_metrics(&self.test_set_name, iteration_number, &metrics)
            .await?;

        let cost = calculate_iteration_cost(
            iteration_number,
            &self.test_set_name,
            &combined,
            &self.config,
            &self.pricing,
        );
        self.results
            .save_cost(&self.test_set_name, iteration_number, &cost)
            .await?;

        if self.analyze_low_quality {
            let report = analyze_low_quality(&combined);
            self.results
                .save_low_faithfulness(&self.test_set_name, iteration_number, &report)
                .await?;
        }

        info!(
            iteration = iteration_number,
            records = combined.len(),
            pass_rate = metrics.overall_pass_rate.value,
            total_cost = cost.total_cost,
            "Iteration complete"
        );

        Ok(combined)
    }

    async fn load_existing_records(
        &self,
        iteration_number: u32,
        test_cases: &[TestCase],
    ) -> Result<Option<Vec<ComparisonRecord>>> {
        if !self
            .results
            .records_exist(&self.test_set_name, iteration_number)
            .await
        {
            return Ok(None);
        }
        let records = self
            .results
            .load_records(&self.test_set_name, iteration_number)
            .await?;
        debug!(
            iteration = iteration_number,
            records = records.len(),
            test_cases = test_cases.len(),
            "Found existing records file"
        );
        Ok(Some(records))
    }

    async fn load_or_start_progress(
        &self,
        iteration_number: u32,
        test_cases: &[TestCase],
    ) -> Result<ProgressFile> {
        if self
            .results
            .progress_exists(&self.test_set_name, iteration_number)
            .await
        {
            let mut progress = self
                .results
                .load_progress(&self.test_set_name, iteration_number)
                .await?;
            info!(
                iteration = iteration_number,
                checkpointed = progress.entries.len(),
                "Resuming from progress checkpoint"
            );
            // The test set may have changed size since the checkpoint.
            progress.statistics =
                ProgressStatistics::compute(test_cases.len(), progress.entries.len());
            Ok(progress)
        } else {
            Ok(ProgressFile::new(
                self.test_set_name.clone(),
                iteration_number,
                test_cases.len(),
            ))
        }
    }

    /// Merge prior and new records in test-case order.
    ///
    /// Prior records come only from an (incomplete) records file. Items that
    /// are checkpointed in progress but absent from both record sources were
    /// completed by a crashed attempt and cannot be reconstructed; they are
    /// deliberately left out.
    fn combine_records(
        &self,
        test_cases: &[TestCase],
        existing: Option<Vec<ComparisonRecord>>,
        new_records: Vec<ComparisonRecord>,
    ) -> Vec<ComparisonRecord> {
        let mut by_id: HashMap<String, ComparisonRecord> = HashMap::new();
        for record in existing.into_iter().flatten().chain(new_records) {
            by_id.insert(record.item_id.clone(), record);
        }

        test_cases
            .iter()
            .filter_map(|tc| by_id.remove(&tc.item_id))
            .collect()
    }
}
