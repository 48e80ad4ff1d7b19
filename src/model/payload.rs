//! Per-type payloads and the `Task` sum that executors dispatch on.

use serde::{Deserialize, Serialize};

/// A job's payload, parsed into the shape its `job_type` selects.
///
/// Adding a job type means a new variant here, a new payload schema in
/// `validate`, and a new executor in `executor`.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    RepoIndex(RepoIndexPayload),
    TestRunner(TestRunnerPayload),
    DocCompactor(DocCompactorPayload),
}

/// Scan repository files and record keyword hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoIndexPayload {
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    pub max_files: u64,
    pub max_file_bytes: u64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Run a fixed list of argv commands through the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestRunnerPayload {
    pub commands: Vec<Vec<String>>,
    pub timeout_sec: u64,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub env_allow: Vec<String>,
}

/// Concatenate input documents into one bounded Markdown summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocCompactorPayload {
    pub inputs: Vec<String>,
    pub max_input_bytes: u64,
    pub max_output_bytes: u64,
    #[serde(default)]
    pub title: Option<String>,
}
