//! End-to-end tests for the resumable iteration harness.
//!
//! A scripted judge stands in for the LLM collaborator: per-item verdicts are
//! fixed up front, failures are injectable, and every call is counted so the
//! resume tests can assert that completed items are never re-judged.

use anyhow::Result;
use async_trait::async_trait;
use rag_evals::{
    DimensionScore, EvaluationConfig, FinalAggregator, IterationRunner, JudgeEvaluator,
    JudgeResult, LocalFileStore, PassPolicy, PricingTable, ProgressEntry, ProgressFile,
    ProgressStatistics, ResultStore, TestCase, UsageEntry, Verdict,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct ScriptedJudge {
    scores: HashMap<String, (u8, u8)>,
    fail_on: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl ScriptedJudge {
    fn new() -> Self {
        Self {
            scores: HashMap::new(),
            fail_on: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_score(mut self, item_id: &str, faithfulness: u8, completeness: u8) -> Self {
        self.scores
            .insert(item_id.to_string(), (faithfulness, completeness));
        self
    }

    fn failing_on(self, item_id: &str) -> Self {
        *self.fail_on.lock().unwrap() = Some(item_id.to_string());
        self
    }

    fn clear_failure(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JudgeEvaluator for ScriptedJudge {
    async fn evaluate(&self, test_case: &TestCase) -> Result<JudgeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_on.lock().unwrap().as_deref() == Some(test_case.item_id.as_str()) {
            anyhow::bail!("simulated judge transport error");
        }

        let (faithfulness, completeness) = self
            .scores
            .get(&test_case.item_id)
            .copied()
            .unwrap_or((5, 5));

        Ok(JudgeResult {
            verdict: Verdict {
                faithfulness: DimensionScore::new(faithfulness, "scripted"),
                completeness: DimensionScore::new(completeness, "scripted"),
            },
            token_usage: vec![UsageEntry::new("gpt-4o", 1000, 100)],
        })
    }
}

fn test_case(item_id: &str) -> TestCase {
    TestCase {
        item_id: item_id.to_string(),
        question: format!("question for {item_id}"),
        answer: format!("answer for {item_id}"),
        context: vec![],
        duration_ms: 100,
    }
}

fn config(output_directory: &Path) -> EvaluationConfig {
    EvaluationConfig {
        output_directory: output_directory.to_path_buf(),
        judge_model: "gpt-4o".to_string(),
        judge_provider: "openai".to_string(),
        iterations: 2,
        prompt_version: "v2".to_string(),
        pass_policy: PassPolicy::default(),
    }
}

fn runner(judge: &Arc<ScriptedJudge>, dir: &TempDir) -> IterationRunner {
    let results = ResultStore::new(Arc::new(LocalFileStore), dir.path());
    IterationRunner::new(
        Arc::clone(judge) as Arc<dyn JudgeEvaluator>,
        results,
        PricingTable::with_default_models(),
        config(dir.path()),
        "set-1",
    )
}

fn result_store(dir: &TempDir) -> ResultStore {
    ResultStore::new(Arc::new(LocalFileStore), dir.path())
}

#[tokio::test]
async fn test_full_iteration_writes_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let judge = Arc::new(
        ScriptedJudge::new()
            .with_score("a", 5, 4)
            .with_score("b", 3, 2),
    );
    let cases = vec![test_case("a"), test_case("b")];

    let records = runner(&judge, &dir).run_iteration(1, &cases).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(judge.call_count(), 2);
    assert!(records[0].passed);
    assert!(!records[1].passed);

    let store = result_store(&dir);
    let metrics = store.load_metrics("set-1", 1).await.unwrap();
    assert_eq!(metrics.sample_count, 2);
    assert!((metrics.average_faithfulness_score.value - 4.0).abs() < f64::EPSILON);
    assert!((metrics.average_completeness_score.value - 3.0).abs() < f64::EPSILON);
    assert!((metrics.overall_pass_rate.value - 0.5).abs() < f64::EPSILON);

    let cost = store.load_cost("set-1", 1).await.unwrap();
    assert_eq!(cost.samples, 2);
    assert_eq!(cost.total_tokens, 2200);
    assert!(cost.total_cost > 0.0);

    // Progress ends at 100%.
    let progress = store.load_progress("set-1", 1).await.unwrap();
    assert_eq!(progress.statistics.completed_questions, 2);
    assert!((progress.statistics.completion_percentage - 100.0).abs() < f64::EPSILON);

    assert!(dir
        .path()
        .join("set-1/low-faithfulness/low-faithfulness-iteration-1.json")
        .is_file());
}

#[tokio::test]
async fn test_second_run_is_idempotent_with_zero_judge_calls() {
    let dir = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::new().with_score("a", 4, 4));
    let cases = vec![test_case("a"), test_case("b")];
    let runner = runner(&judge, &dir);

    let first = runner.run_iteration(1, &cases).await.unwrap();
    assert_eq!(judge.call_count(), 2);

    let second = runner.run_iteration(1, &cases).await.unwrap();
    assert_eq!(judge.call_count(), 2, "second run must make no judge calls");

    let first_json = serde_json::to_string(&first).unwrap();
    let second_json = serde_json::to_string(&second).unwrap();
    assert_eq!(first_json, second_json);
}

#[tokio::test]
async fn test_judge_failure_keeps_partial_progress_and_no_records_file() {
    let dir = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::new().failing_on("b"));
    let cases = vec![test_case("a"), test_case("b"), test_case("c")];

    let err = runner(&judge, &dir).run_iteration(1, &cases).await.unwrap_err();
    assert!(format!("{err:#}").contains("Judge evaluation failed for item b"));

    // Item a was judged; b failed; c was never reached.
    assert_eq!(judge.call_count(), 2);

    let store = result_store(&dir);
    let progress = store.load_progress("set-1", 1).await.unwrap();
    assert_eq!(progress.statistics.completed_questions, 1);
    assert_eq!(progress.statistics.pending_questions, 2);
    assert_eq!(progress.entries.len(), 1);
    assert_eq!(progress.entries[0].item_id, "a");

    // Partial output is never promoted to the done artifact.
    assert!(!store.records_exist("set-1", 1).await);
}

#[tokio::test]
async fn test_resume_evaluates_only_the_gap() {
    let dir = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::new().failing_on("c"));
    let cases = vec![test_case("a"), test_case("b"), test_case("c")];
    let runner = runner(&judge, &dir);

    runner.run_iteration(1, &cases).await.unwrap_err();
    assert_eq!(judge.call_count(), 3);

    judge.clear_failure();
    let records = runner.run_iteration(1, &cases).await.unwrap();

    // Only the gap item was judged again.
    assert_eq!(judge.call_count(), 4);

    // Resume asymmetry: the checkpointed items cannot be reconstructed into
    // full records, so only the newly evaluated subset comes back.
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_id, "c");

    let store = result_store(&dir);
    let progress = store.load_progress("set-1", 1).await.unwrap();
    assert_eq!(progress.statistics.completed_questions, 3);
    assert!(store.records_exist("set-1", 1).await);
    let persisted = store.load_records("set-1", 1).await.unwrap();
    assert_eq!(persisted.len(), 1);
}

#[tokio::test]
async fn test_stale_progress_entries_are_ignored() {
    let dir = TempDir::new().unwrap();
    let store = result_store(&dir);

    // A checkpoint from a previous version of the test set, referencing an
    // item that no longer exists.
    let mut progress = ProgressFile::new("set-1", 1, 1);
    progress.entries.push(ProgressEntry {
        item_id: "ghost".to_string(),
        result: rag_evals::ItemOutcome {
            faithfulness_score: 5,
            completeness_score: 5,
            passed: true,
        },
        completed_at: chrono::Utc::now(),
    });
    progress.statistics = ProgressStatistics::compute(1, 1);
    store.save_progress("set-1", 1, &progress).await.unwrap();

    let judge = Arc::new(ScriptedJudge::new());
    let cases = vec![test_case("a"), test_case("b")];
    let records = runner(&judge, &dir).run_iteration(1, &cases).await.unwrap();

    // Both current items were evaluated; the ghost entry changed nothing.
    assert_eq!(judge.call_count(), 2);
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_test_set_growth_extends_a_finished_iteration() {
    let dir = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::new());
    let runner = runner(&judge, &dir);

    let original = vec![test_case("a"), test_case("b")];
    runner.run_iteration(1, &original).await.unwrap();
    assert_eq!(judge.call_count(), 2);

    // A new item appears; only it gets judged, and the persisted records now
    // cover all three because the prior records file was loadable.
    let grown = vec![test_case("a"), test_case("b"), test_case("c")];
    let records = runner.run_iteration(1, &grown).await.unwrap();
    assert_eq!(judge.call_count(), 3);
    assert_eq!(records.len(), 3);

    let ids: Vec<&str> = records.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_finalize_run_aggregates_across_iterations() {
    let dir = TempDir::new().unwrap();
    let cases = vec![test_case("a"), test_case("b")];

    // Iteration 1 judged generously, iteration 2 less so.
    let generous = Arc::new(
        ScriptedJudge::new()
            .with_score("a", 5, 5)
            .with_score("b", 5, 5),
    );
    let strict = Arc::new(
        ScriptedJudge::new()
            .with_score("a", 5, 4)
            .with_score("b", 3, 2),
    );
    runner(&generous, &dir).run_iteration(1, &cases).await.unwrap();
    runner(&strict, &dir).run_iteration(2, &cases).await.unwrap();

    let aggregator = FinalAggregator::new(result_store(&dir), config(dir.path()), "set-1");
    let (final_metrics, final_cost) = aggregator.finalize_run().await.unwrap();

    // Faithfulness means 5.0 and 4.0 aggregate to 4.5.
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

    assert_eq!(final_cost.aggregate_stats.total_samples, 4);
    assert_eq!(final_cost.per_iteration_costs.len(), 2);

    assert!(dir.path().join("set-1/final-metrics/final-metrics.json").is_file());
    assert!(dir.path().join("set-1/final-cost/final-cost.json").is_file());
}

#[tokio::test]
async fn test_finalize_run_requires_every_iteration() {
    let dir = TempDir::new().unwrap();
    let judge = Arc::new(ScriptedJudge::new());
    let cases = vec![test_case("a")];

    // Only 1 of the 2 configured iterations has run.
    runner(&judge, &dir).run_iteration(1, &cases).await.unwrap();

    let aggregator = FinalAggregator::new(result_store(&dir), config(dir.path()), "set-1");
    let err = aggregator.finalize_run().await.unwrap_err();
    assert!(format!("{err:#}").contains("iteration 2"));
}
