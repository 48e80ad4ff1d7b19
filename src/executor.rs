//! Executors: the work each job type performs once a worker holds its claim.
//!
//! [`execute`] dispatches a parsed [`Task`] to its executor. Every executor
//! runs synchronously on the worker's thread, charges its own consumption to
//! the job's [`BudgetTracker`], and calls [`ExecContext::checkpoint`] at loop
//! boundaries so wall time is enforced and the lease stays fresh.
//!
//! Executors must be idempotent under re-offer: artifacts they write are
//! truncated on creation, so a second run replaces the first.

mod doc_compactor;
mod repo_index;
mod test_runner;

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::budget::{BudgetExceeded, BudgetTracker};
use crate::evidence::{EvidenceError, EvidenceWriter};
use crate::ledger::{Ledger, LedgerError};
use crate::model::{Job, Task, TaskError};
use crate::policy::PolicyError;
use crate::sandbox::SandboxError;

/// Why an executor stopped. The Display string is what the ledger records.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Budget(#[from] BudgetExceeded),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Evidence(EvidenceError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("unsupported_job_type:{0}")]
    UnsupportedJobType(String),

    #[error("{0}")]
    Runtime(String),
}

pub type Result<T> = core::result::Result<T, ExecError>;

impl From<EvidenceError> for ExecError {
    fn from(e: EvidenceError) -> Self {
        match e {
            // Budget trips surface as themselves, not as evidence failures.
            EvidenceError::Budget(b) => Self::Budget(b),
            other => Self::Evidence(other),
        }
    }
}

impl From<TaskError> for ExecError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::UnsupportedJobType(t) => Self::UnsupportedJobType(t),
            TaskError::Payload(e) => Self::Runtime(format!("invalid payload: {e}")),
        }
    }
}

/// A file an executor produced, with its SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: &'static str,
    pub path: String,
    pub sha256: String,
}

/// What a successful executor hands back to the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    /// Recorded verbatim in the ledger's `complete` event.
    pub result: Value,

    /// Markdown written to `<job_id>.md`.
    pub summary: String,
    pub artifacts: Vec<Artifact>,
}

/// Renews the claim while an executor runs.
#[derive(Debug)]
struct LeaseKeeper<'a> {
    ledger: &'a Ledger,
    worker_id: &'a str,
    lease_sec: f64,
    last_renewed: Instant,
}

/// Everything an executor may touch.
#[derive(Debug)]
pub struct ExecContext<'a> {
    pub repo_root: &'a Path,
    pub job: &'a Job,
    pub evidence: &'a EvidenceWriter,
    pub budget: &'a mut BudgetTracker,
    lease: Option<LeaseKeeper<'a>>,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        repo_root: &'a Path,
        job: &'a Job,
        evidence: &'a EvidenceWriter,
        budget: &'a mut BudgetTracker,
    ) -> Self {
        Self {
            repo_root,
            job,
            evidence,
            budget,
            lease: None,
        }
    }

    /// Heartbeat through `ledger` from [`ExecContext::checkpoint`] once half
    /// the lease has passed since the claim.
    #[must_use]
    pub fn with_lease(mut self, ledger: &'a Ledger, worker_id: &'a str, lease_sec: f64) -> Self {
        self.lease = Some(LeaseKeeper {
            ledger,
            worker_id,
            lease_sec,
            last_renewed: Instant::now(),
        });
        self
    }

    /// Loop-boundary check: enforce wall time, renew the lease if it is half spent.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.budget.check_wall_time()?;

        if let Some(lease) = &mut self.lease {
            let half = Duration::from_secs_f64(lease.lease_sec.max(0.0) / 2.0);
            if lease.last_renewed.elapsed() > half {
                lease
                    .ledger
                    .heartbeat(&self.job.job_id, lease.worker_id, lease.lease_sec)?;
                lease.last_renewed = Instant::now();
            }
        }
        Ok(())
    }

    /// Authorize a named tool call: policy filter first, then one tool-call unit.
    ///
    /// This is the gate for tool calls requested by a pluggable model client;
    /// the built-in executors charge their own calls directly.
    pub fn authorize_tool_call(&mut self, name: &str) -> Result<()> {
        self.job.tool_policy.check_tool_call(name)?;
        self.budget.record_tool_call()?;
        debug!(job_id = %self.job.job_id, tool = name, "tool call authorized");
        Ok(())
    }

    /// Append a progress row to the job's evidence stream, charged to the output budget.
    pub fn record(&mut self, event: &str, fields: Value) -> Result<()> {
        self.evidence.append_charged(self.budget, event, fields)?;
        Ok(())
    }

    /// Repo-relative display form of a path under the repo root.
    fn relative_display(&self, path: &Path) -> String {
        let root = self
            .repo_root
            .canonicalize()
            .unwrap_or_else(|_| self.repo_root.to_path_buf());
        path.strip_prefix(&root)
            .or_else(|_| path.strip_prefix(self.repo_root))
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Run `task` to completion or to its first error.
pub fn execute(task: &Task, ctx: &mut ExecContext<'_>) -> Result<ExecOutcome> {
    ctx.checkpoint()?;
    match task {
        Task::RepoIndex(payload) => repo_index::run(payload, ctx),
        Task::TestRunner(payload) => test_runner::run(payload, ctx),
        Task::DocCompactor(payload) => doc_compactor::run(payload, ctx),
    }
}
