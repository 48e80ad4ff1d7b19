//! The worker driver: claim a job, execute it, record the outcome.
//!
//! One tick of [`Worker::run_once`]:
//!
//! 1. Kill switch present: report [`TickOutcome::KillSwitch`], claim nothing.
//! 2. Claim the next queued job, or report [`TickOutcome::Idle`].
//! 3. Write the `claimed` evidence row and heartbeat once.
//! 4. Execute under a fresh [`BudgetTracker`].
//! 5. Success: summary, `complete` ledger event, `complete` evidence row.
//! 6. Any error: `fail` ledger event and `failed` evidence row.
//!
//! Job failures never surface as `Err`; only ledger I/O does.

use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::budget::BudgetTracker;
use crate::evidence::EvidenceWriter;
use crate::executor::{self, ExecContext, ExecError};
use crate::layout::StateLayout;
use crate::ledger::{self, Ledger};
use crate::model::Job;

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickOutcome {
    KillSwitch,
    Idle,
    Complete { job_id: String, result: Value },
    Failed { job_id: String, error: String },
}

impl TickOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::KillSwitch => "kill_switch",
            Self::Idle => "idle",
            Self::Complete { .. } => "complete",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Fields for the `complete` evidence row and ledger event.
struct Completion {
    result: Value,
    evidence: Value,
}

/// A single-threaded worker bound to one repo root.
#[derive(Debug)]
pub struct Worker {
    layout: StateLayout,
    ledger: Ledger,
    worker_id: String,
    lease_sec: f64,
}

impl Worker {
    pub fn new(layout: StateLayout, worker_id: impl Into<String>, lease_sec: f64) -> ledger::Result<Self> {
        let ledger = Ledger::open(&layout)?;
        Ok(Self {
            layout,
            ledger,
            worker_id: worker_id.into(),
            lease_sec,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Process at most one job.
    pub fn run_once(&self) -> ledger::Result<TickOutcome> {
        if self.layout.kill_switch_engaged() {
            debug!(worker_id = %self.worker_id, "kill switch engaged, not claiming");
            return Ok(TickOutcome::KillSwitch);
        }

        let Some(job) = self.ledger.claim_next_job(&self.worker_id, self.lease_sec)? else {
            return Ok(TickOutcome::Idle);
        };
        let job_id = job.job_id.clone();

        match self.process(&job) {
            Ok(done) => {
                self.ledger
                    .complete_job(&job_id, &self.worker_id, done.result.clone())?;
                self.append_evidence(&job_id, "complete", done.evidence);
                Ok(TickOutcome::Complete {
                    job_id,
                    result: done.result,
                })
            }
            Err(e) => {
                let error = e.to_string();
                warn!(job_id = %job_id, worker_id = %self.worker_id, error = %error, "job failed");
                self.ledger.fail_job(&job_id, &self.worker_id, &error)?;
                self.append_evidence(
                    &job_id,
                    "failed",
                    json!({"worker_id": self.worker_id, "error": error}),
                );
                Ok(TickOutcome::Failed { job_id, error })
            }
        }
    }

    /// Tick until `max_ticks` is reached, or forever when it is `None`.
    ///
    /// Sleeps `poll` after any tick that did no work. The kill switch only
    /// pauses claiming; the loop keeps polling until it is removed. Returns the
    /// last tick's outcome, so a bounded loop stopped by the switch reports
    /// [`TickOutcome::KillSwitch`]. A ledger error on the last tick reports
    /// [`TickOutcome::Idle`].
    pub fn run_loop(&self, poll: Duration, max_ticks: Option<u64>) -> TickOutcome {
        info!(worker_id = %self.worker_id, lease_sec = self.lease_sec, "worker started");
        let mut ticks = 0u64;
        let mut paused = false;
        let mut last = TickOutcome::Idle;

        while max_ticks.is_none_or(|max| ticks < max) {
            ticks += 1;
            last = match self.run_once() {
                Ok(TickOutcome::KillSwitch) => {
                    if !paused {
                        info!(worker_id = %self.worker_id, "kill switch engaged, claiming paused");
                        paused = true;
                    }
                    TickOutcome::KillSwitch
                }
                Ok(outcome) => {
                    if outcome != TickOutcome::Idle {
                        info!(worker_id = %self.worker_id, status = outcome.status(), "tick");
                    }
                    outcome
                }
                Err(e) => {
                    warn!(worker_id = %self.worker_id, error = %e, "ledger error");
                    TickOutcome::Idle
                }
            };
            if paused && !self.layout.kill_switch_engaged() {
                info!(worker_id = %self.worker_id, "kill switch cleared, claiming resumed");
                paused = false;
            }
            let worked = matches!(last, TickOutcome::Complete { .. } | TickOutcome::Failed { .. });
            if !worked && max_ticks.is_none_or(|max| ticks < max) {
                thread::sleep(poll);
            }
        }

        info!(worker_id = %self.worker_id, status = last.status(), ticks, "worker stopped");
        last
    }

    // ── Helpers ──

    fn process(&self, job: &Job) -> Result<Completion, ExecError> {
        let evidence = EvidenceWriter::open(self.layout.evidence_dir(), &job.job_id)?;
        evidence.append(
            "claimed",
            json!({
                "worker_id": self.worker_id,
                "job_type": job.job_type,
                "lease_sec": self.lease_sec,
            }),
        )?;
        self.ledger
            .heartbeat(&job.job_id, &self.worker_id, self.lease_sec)?;

        let mut budget = BudgetTracker::new(job.budgets);
        let outcome = {
            let task = job.task()?;
            let mut ctx = ExecContext::new(self.layout.repo_root(), job, &evidence, &mut budget)
                .with_lease(&self.ledger, &self.worker_id, self.lease_sec);
            executor::execute(&task, &mut ctx)?
        };

        budget.record_output_bytes(outcome.summary.len() as u64)?;
        let summary_sha256 = evidence.write_summary(&outcome.summary)?;
        info!(job_id = %job.job_id, worker_id = %self.worker_id, "job executed");

        Ok(Completion {
            evidence: json!({
                "worker_id": self.worker_id,
                "result": outcome.result,
                "summary_sha256": summary_sha256,
                "artifacts": outcome.artifacts,
                "usage": budget.usage(),
            }),
            result: outcome.result,
        })
    }

    /// Lifecycle rows are best-effort once the ledger has the terminal event.
    fn append_evidence(&self, job_id: &str, event: &str, fields: Value) {
        let written = EvidenceWriter::open(self.layout.evidence_dir(), job_id)
            .and_then(|w| w.append(event, fields));
        if let Err(e) = written {
            warn!(job_id, event, error = %e, "failed to write evidence row");
        }
    }
}
