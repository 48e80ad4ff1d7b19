//! Job types: the immutable work request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::payload::{DocCompactorPayload, RepoIndexPayload, Task, TestRunnerPayload};

/// An immutable work request, as submitted by a producer.
///
/// `job_type` stays a plain string on the wire so a ledger written by a newer
/// producer still replays; dispatch turns it into a [`JobType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    pub job_id: String,
    pub job_type: String,
    pub created_at_utc: String,
    pub payload: serde_json::Value,
    pub budgets: Budgets,
    pub tool_policy: ToolPolicy,
}

impl Job {
    /// Parse the payload into the typed task its `job_type` selects.
    ///
    /// Fails with the unknown type name, or with the serde message when the
    /// payload does not fit the selected shape.
    pub fn task(&self) -> Result<Task, TaskError> {
        let job_type: JobType = self
            .job_type
            .parse()
            .map_err(|()| TaskError::UnsupportedJobType(self.job_type.clone()))?;

        let payload = self.payload.clone();
        let task = match job_type {
            JobType::RepoIndex => {
                Task::RepoIndex(serde_json::from_value::<RepoIndexPayload>(payload)?)
            }
            JobType::TestRunner => {
                Task::TestRunner(serde_json::from_value::<TestRunnerPayload>(payload)?)
            }
            JobType::DocCompactor => {
                Task::DocCompactor(serde_json::from_value::<DocCompactorPayload>(payload)?)
            }
        };
        Ok(task)
    }
}

/// Why a job's payload could not become a [`Task`].
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("unsupported_job_type:{0}")]
    UnsupportedJobType(String),

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// The executor a job is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    RepoIndex,
    TestRunner,
    DocCompactor,
}

impl JobType {
    pub const fn all() -> &'static [Self] {
        &[Self::RepoIndex, Self::TestRunner, Self::DocCompactor]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RepoIndex => "repo_index_task",
            Self::TestRunner => "test_runner_task",
            Self::DocCompactor => "doc_compactor_task",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// Hard resource ceilings for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Budgets {
    pub max_wall_time_sec: u64,
    pub max_tool_calls: u64,
    pub max_output_bytes: u64,
    pub max_concurrency_slots: u64,
}

/// What a job is permitted to touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolPolicy {
    pub allow_network: bool,
    pub allow_subprocess: bool,
    pub allowed_tools: Vec<String>,
}
