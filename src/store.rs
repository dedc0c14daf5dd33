//! Artifact persistence: the file primitive seam and the result layout owner.
//!
//! [`ResultStore`] exclusively owns the on-disk representation. Every write is
//! a whole-document overwrite via write-temp-then-rename, so a reader never
//! observes a half-written JSON file as long as the OS rename is atomic. The
//! layout under `output_directory/test_set_name/`:
//!
//! ```text
//! iteration-<N>/.progress.json
//! records/records-iteration-<N>.json
//! metrics/metrics-iteration-<N>.json
//! cost/cost-iteration-<N>.json
//! low-faithfulness/low-faithfulness-iteration-<N>.json
//! final-metrics/final-metrics.json
//! final-cost/final-cost.json
//! ```

use crate::comparison::ComparisonRecord;
use crate::cost::{FinalCost, IterationCost};
use crate::low_quality::LowQualityReport;
use crate::metrics::{FinalMetrics, IterationMetrics};
use crate::progress::ProgressFile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File primitive the store delegates to.
///
/// A single-writer collaborator: `write` must replace the whole document, and
/// implementations are expected to make the replacement atomic enough that a
/// concurrent reader sees either the old or the new document, never a mix.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Whether a file exists at `path`.
    async fn exists(&self, path: &Path) -> bool;

    /// Read an entire file.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the entire file at `path` with `bytes`.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Create a directory and all missing parents.
    async fn ensure_dir(&self, path: &Path) -> Result<()>;

    /// Remove a directory tree. Succeeds if it does not exist.
    async fn remove_dir_all(&self, path: &Path) -> Result<()>;
}

/// Local-filesystem implementation on `tokio::fs`.
///
/// Writes go to a temporary sibling first and are renamed into place.
#[derive(Debug, Clone, Default)]
pub struct LocalFileStore;

#[async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {path:?}"))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create parent directory: {parent:?}"))?;
        }

        // Temp sibling in the same directory so the rename stays on one
        // filesystem.
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Path has no usable file name: {path:?}"))?;
        let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

        tokio::fs::write(&tmp_path, bytes)
            .await
            .with_context(|| format!("Failed to write temp file: {tmp_path:?}"))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("Failed to move {tmp_path:?} into place at {path:?}"))?;
        Ok(())
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory: {path:?}"))
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove directory: {path:?}")),
        }
    }
}

const RECORDS_DIR: &str = "records";
const METRICS_DIR: &str = "metrics";
const LOW_FAITHFULNESS_DIR: &str = "low-faithfulness";
const COST_DIR: &str = "cost";
const FINAL_METRICS_DIR: &str = "final-metrics";
const FINAL_COST_DIR: &str = "final-cost";

/// Typed save/load for every artifact kind, keyed by test set and iteration.
#[derive(Clone)]
pub struct ResultStore {
    files: Arc<dyn FileStore>,
    output_directory: PathBuf,
}

impl ResultStore {
    /// Create a store rooted at `output_directory`.
    pub fn new(files: Arc<dyn FileStore>, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            files,
            output_directory: output_directory.into(),
        }
    }

    fn test_set_root(&self, test_set_name: &str) -> PathBuf {
        self.output_directory.join(test_set_name)
    }

    /// Path of the progress checkpoint for one iteration.
    #[must_use]
    pub fn progress_path(&self, test_set_name: &str, iteration: u32) -> PathBuf {
        self.test_set_root(test_set_name)
            .join(format!("iteration-{iteration}"))
            .join(".progress.json")
    }

    /// Path of the records file for one iteration.
    #[must_use]
    pub fn records_path(&self, test_set_name: &str, iteration: u32) -> PathBuf {
        self.test_set_root(test_set_name)
            .join(RECORDS_DIR)
            .join(format!("records-iteration-{iteration}.json"))
    }

    /// Path of the metrics file for one iteration.
    #[must_use]
    pub fn metrics_path(&self, test_set_name: &str, iteration: u32) -> PathBuf {
        self.test_set_root(test_set_name)
            .join(METRICS_DIR)
            .join(format!("metrics-iteration-{iteration}.json"))
    }

    /// Path of the cost file for one iteration.
    #[must_use]
    pub fn cost_path(&self, test_set_name: &str, iteration: u32) -> PathBuf {
        self.test_set_root(test_set_name)
            .join(COST_DIR)
            .join(format!("cost-iteration-{iteration}.json"))
    }

    /// Path of the low-faithfulness analysis for one iteration.
    #[must_use]
    pub fn low_faithfulness_path(&self, test_set_name: &str, iteration: u32) -> PathBuf {
        self.test_set_root(test_set_name)
            .join(LOW_FAITHFULNESS_DIR)
            .join(format!("low-faithfulness-iteration-{iteration}.json"))
    }

    /// Path of the run-level metrics aggregate.
    #[must_use]
    pub fn final_metrics_path(&self, test_set_name: &str) -> PathBuf {
        self.test_set_root(test_set_name)
            .join(FINAL_METRICS_DIR)
            .join("final-metrics.json")
    }

    /// Path of the run-level cost aggregate.
    #[must_use]
    pub fn final_cost_path(&self, test_set_name: &str) -> PathBuf {
        self.test_set_root(test_set_name)
            .join(FINAL_COST_DIR)
            .join("final-cost.json")
    }

    /// Create the fixed subdirectory layout for a test set.
    pub async fn ensure_directory_structure(&self, test_set_name: &str) -> Result<()> {
        let root = self.test_set_root(test_set_name);
        for dir in [
            RECORDS_DIR,
            METRICS_DIR,
            LOW_FAITHFULNESS_DIR,
            COST_DIR,
            FINAL_METRICS_DIR,
            FINAL_COST_DIR,
        ] {
            self.files.ensure_dir(&root.join(dir)).await?;
        }
        Ok(())
    }

    /// Delete every artifact of a test set.
    pub async fn delete_test_set(&self, test_set_name: &str) -> Result<()> {
        self.files
            .remove_dir_all(&self.test_set_root(test_set_name))
            .await
    }

    async fn save_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)
            .with_context(|| format!("Failed to serialize document for {path:?}"))?;
        self.files.write(path, &bytes).await
    }

    async fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = self.files.read(path).await?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to deserialize document at {path:?}"))
    }

    /// Whether a records file exists for an iteration.
    pub async fn records_exist(&self, test_set_name: &str, iteration: u32) -> bool {
        self.files
            .exists(&self.records_path(test_set_name, iteration))
            .await
    }

    /// Persist an iteration's complete record set.
    pub async fn save_records(
        &self,
        test_set_name: &str,
        iteration: u32,
        records: &[ComparisonRecord],
    ) -> Result<()> {
        self.save_json(&self.records_path(test_set_name, iteration), &records)
            .await
    }

    /// Load an iteration's record set.
    pub async fn load_records(
        &self,
        test_set_name: &str,
        iteration: u32,
    ) -> Result<Vec<ComparisonRecord>> {
        self.load_json(&self.records_path(test_set_name, iteration))
            .await
    }

    /// Whether a progress checkpoint exists for an iteration.
    pub async fn progress_exists(&self, test_set_name: &str, iteration: u32) -> bool {
        self.files
            .exists(&self.progress_path(test_set_name, iteration))
            .await
    }

    /// Rewrite an iteration's progress checkpoint.
    pub async fn save_progress(
        &self,
        test_set_name: &str,
        iteration: u32,
        progress: &ProgressFile,
    ) -> Result<()> {
        self.save_json(&self.progress_path(test_set_name, iteration), progress)
            .await
    }

    /// Load an iteration's progress checkpoint.
    pub async fn load_progress(&self, test_set_name: &str, iteration: u32) -> Result<ProgressFile> {
        self.load_json(&self.progress_path(test_set_name, iteration))
            .await
    }

    /// Persist an iteration's quality statistics.
    pub async fn save_metrics(
        &self,
        test_set_name: &str,
        iteration: u32,
        metrics: &IterationMetrics,
    ) -> Result<()> {
        self.save_json(&self.metrics_path(test_set_name, iteration), metrics)
            .await
    }

    /// Load an iteration's quality statistics.
    pub async fn load_metrics(
        &self,
        test_set_name: &str,
        iteration: u32,
    ) -> Result<IterationMetrics> {
        self.load_json(&self.metrics_path(test_set_name, iteration))
            .await
    }

    /// Persist an iteration's cost statistics.
    pub async fn save_cost(
        &self,
        test_set_name: &str,
        iteration: u32,
        cost: &IterationCost,
    ) -> Result<()> {
        self.save_json(&self.cost_path(test_set_name, iteration), cost)
            .await
    }

    /// Load an iteration's cost statistics.
    pub async fn load_cost(&self, test_set_name: &str, iteration: u32) -> Result<IterationCost> {
        self.load_json(&self.cost_path(test_set_name, iteration))
            .await
    }

    /// Persist an iteration's low-quality analysis.
    pub async fn save_low_faithfulness(
        &self,
        test_set_name: &str,
        iteration: u32,
        report: &LowQualityReport,
    ) -> Result<()> {
        self.save_json(&self.low_faithfulness_path(test_set_name, iteration), report)
            .await
    }

    /// Persist the run-level metrics aggregate.
    pub async fn save_final_metrics(
        &self,
        test_set_name: &str,
        final_metrics: &FinalMetrics,
    ) -> Result<()> {
        self.save_json(&self.final_metrics_path(test_set_name), final_metrics)
            .await
    }

    /// Persist the run-level cost aggregate.
    pub async fn save_final_cost(&self, test_set_name: &str, final_cost: &FinalCost) -> Result<()> {
        self.save_json(&self.final_cost_path(test_set_name), final_cost)
            .await
    }
}
