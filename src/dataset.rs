//! Test-case dataset types and loading.
//!
//! A test set is a curated list of question/answer pairs produced upstream
//! (answers are pre-generated by the system under evaluation). The harness
//! never mutates test cases; it only scores them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One retrieved context chunk attached to a test case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextItem {
    /// Where the chunk came from (document id, URL, ...)
    pub source: String,

    /// The chunk text handed to the answer generator
    pub content: String,
}

/// A single question with its pre-generated answer and retrieval context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique identifier for this item (e.g., "`qa_0042`")
    pub item_id: String,

    /// The user question
    pub question: String,

    /// The system's generated answer to be judged
    pub answer: String,

    /// Retrieval context the answer was generated from
    #[serde(default)]
    pub context: Vec<ContextItem>,

    /// Wall-clock time the answer generation took, in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
}

/// A named collection of test cases.
#[derive(Debug, Clone)]
pub struct TestSet {
    /// Test-set name; becomes the output directory name for all artifacts
    pub name: String,

    /// All test cases, in evaluation order
    pub cases: Vec<TestCase>,
}

impl TestSet {
    /// Create a test set from already-loaded cases.
    #[must_use]
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }

    /// Load a test set from a JSON file containing an array of test cases.
    ///
    /// The file stem becomes the test-set name unless overridden via
    /// [`TestSet::new`].
    ///
    /// # Example
    /// ```no_run
    /// use rag_evals::dataset::TestSet;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let set = TestSet::load("datasets/course-qa.json")?;
    /// println!("loaded {} cases as '{}'", set.cases.len(), set.name);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(String::from)
            .with_context(|| format!("Test-set path has no usable file name: {path:?}"))?;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read test-set file: {path:?}"))?;

        let cases: Vec<TestCase> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse test-set file: {path:?}"))?;

        if cases.is_empty() {
            anyhow::bail!("Test-set file contains no test cases: {path:?}");
        }

        Ok(Self { name, cases })
    }
}
