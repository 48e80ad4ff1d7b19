//! Job snapshots: the view derived by replaying the ledger. Never persisted.

use jiff::Timestamp;
use serde::Serialize;

use super::Job;

/// Where a job stands after replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Complete,
    Failed,
}

impl JobState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// The materialized state of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job: Job,
    pub state: JobState,
    pub claimed_by: Option<String>,
    pub lease_expires_unix: Option<f64>,
    pub updated_ts: Timestamp,

    /// Zero-based line index of the job's `enqueue` event.
    pub enqueued_at_line: usize,
}
