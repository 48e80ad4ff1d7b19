//! The durable ledger: an append-only JSONL event log plus the claim lock.
//!
//! ```text
//! <state>/
//!   jobs.jsonl   # One `LedgerEvent` per line, never rewritten
//!   jobs.lock    # Advisory exclusive lock around enqueue and claim decisions
//! ```
//!
//! All job state is derived by replaying `jobs.jsonl` (see [`replay`]).
//! The lock serializes decisions that read-then-append (enqueue's duplicate
//! check and claim selection). Heartbeats and terminal events are plain
//! appends by the worker that holds the claim.

mod replay;

pub use replay::replay;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use fs2::FileExt;
use jiff::Timestamp;
use serde_json::Value;
use tracing::{debug, info};

use crate::layout::StateLayout;
use crate::model::{Job, JobSnapshot, JobState, LedgerEvent};
use crate::validate::{ValidationError, ValidatorMode, validate_job};

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid job: {0}")]
    Validation(#[from] ValidationError),

    #[error("job already enqueued: {0}")]
    DuplicateJob(String),

    #[error("ledger lock error: {0}")]
    Lock(io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, LedgerError>;

/// Current unix time in fractional seconds.
pub fn now_unix() -> f64 {
    Timestamp::now().as_duration().as_secs_f64()
}

/// Handle to the ledger files under a state directory.
#[derive(Debug, Clone)]
pub struct Ledger {
    ledger_path: PathBuf,
    lock_path: PathBuf,
}

/// Holds the exclusive lock until dropped.
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well.
        let _ = FileExt::unlock(&self.0);
    }
}

impl Ledger {
    /// Opens the ledger, creating the state directory if it doesn't exist.
    pub fn open(layout: &StateLayout) -> Result<Self> {
        fs::create_dir_all(layout.state_dir())?;
        Ok(Self {
            ledger_path: layout.ledger_path(),
            lock_path: layout.lock_path(),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.ledger_path
    }

    // ── Producers ──

    /// Validate a raw job document and append its `enqueue` event.
    ///
    /// A `job_id` that already has an `enqueue` event is rejected.
    pub fn enqueue_job(&self, document: &Value) -> Result<LedgerEvent> {
        let job = validate_job(document)?;

        let _lock = self.lock()?;
        let exists = self.read_events()?.iter().any(|(_, e)| {
            matches!(e, LedgerEvent::Enqueue { job: j, .. } if j.job_id == job.job_id)
        });
        if exists {
            return Err(LedgerError::DuplicateJob(job.job_id));
        }

        let event = LedgerEvent::Enqueue {
            ts_utc: Timestamp::now(),
            validator_mode: ValidatorMode::active().as_str().to_string(),
            job,
        };
        self.append(&event)?;
        info!(job_id = event.job_id(), "job enqueued");
        Ok(event)
    }

    /// Typed convenience over [`Ledger::enqueue_job`]; the job is still validated.
    pub fn enqueue(&self, job: &Job) -> Result<LedgerEvent> {
        self.enqueue_job(&serde_json::to_value(job)?)
    }

    // ── Readers ──

    /// Read every parseable event with its line index. Torn or foreign lines are skipped.
    pub fn read_events(&self) -> Result<Vec<(usize, LedgerEvent)>> {
        let bytes = match fs::read(&self.ledger_path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        let mut skipped = 0usize;
        for (i, line) in bytes.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<LedgerEvent>(line) {
                Ok(event) => events.push((i, event)),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(skipped, path = %self.ledger_path.display(), "skipped unparseable ledger lines");
        }
        Ok(events)
    }

    /// Current snapshots, keyed (and so ordered) by `job_id`.
    pub fn snapshots(&self) -> Result<BTreeMap<String, JobSnapshot>> {
        self.snapshots_at(now_unix())
    }

    pub fn snapshots_at(&self, now: f64) -> Result<BTreeMap<String, JobSnapshot>> {
        Ok(replay(self.read_events()?, now))
    }

    // ── Workers ──

    /// Claim the queued job with the smallest `job_id`, leasing it for `lease_sec`.
    ///
    /// Ordering is lexicographic by id, not by arrival. Returns `None` when no
    /// job is queued (including when every running lease is still live).
    pub fn claim_next_job(&self, worker_id: &str, lease_sec: f64) -> Result<Option<Job>> {
        let _lock = self.lock()?;

        let now = now_unix();
        let snapshots = self.snapshots_at(now)?;
        let Some(snap) = snapshots.into_values().find(|s| s.state == JobState::Queued) else {
            return Ok(None);
        };

        let event = LedgerEvent::Claim {
            ts_utc: Timestamp::now(),
            job_id: snap.job.job_id.clone(),
            worker_id: worker_id.to_string(),
            lease_expires_unix: now + lease_sec,
        };
        self.append(&event)?;
        info!(job_id = %snap.job.job_id, worker_id, lease_sec, "job claimed");
        Ok(Some(snap.job))
    }

    /// Extend the caller's lease. Takes no lock: only the holder should call this,
    /// and replay ignores heartbeats from anyone else.
    pub fn heartbeat(&self, job_id: &str, worker_id: &str, lease_sec: f64) -> Result<LedgerEvent> {
        let event = LedgerEvent::Heartbeat {
            ts_utc: Timestamp::now(),
            job_id: job_id.to_string(),
            worker_id: worker_id.to_string(),
            lease_expires_unix: now_unix() + lease_sec,
        };
        self.append(&event)?;
        debug!(job_id, worker_id, "heartbeat");
        Ok(event)
    }

    pub fn complete_job(&self, job_id: &str, worker_id: &str, result: Value) -> Result<LedgerEvent> {
        let event = LedgerEvent::Complete {
            ts_utc: Timestamp::now(),
            job_id: job_id.to_string(),
            worker_id: worker_id.to_string(),
            result,
        };
        self.append(&event)?;
        info!(job_id, worker_id, "job complete");
        Ok(event)
    }

    pub fn fail_job(&self, job_id: &str, worker_id: &str, error: &str) -> Result<LedgerEvent> {
        let event = LedgerEvent::Fail {
            ts_utc: Timestamp::now(),
            job_id: job_id.to_string(),
            worker_id: worker_id.to_string(),
            error: error.to_string(),
        };
        self.append(&event)?;
        info!(job_id, worker_id, error, "job failed");
        Ok(event)
    }

    // ── Helpers ──

    fn lock(&self) -> Result<LockGuard> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(LedgerError::Lock)?;
        file.lock_exclusive().map_err(LedgerError::Lock)?;
        Ok(LockGuard(file))
    }

    /// Append one event as a single write. If a previous writer crashed
    /// mid-line, a newline is written first so the torn line stays isolated.
    fn append(&self, event: &LedgerEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.ledger_path)?;

        let mut line = String::new();
        if ends_mid_line(&mut file)? {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(event)?);
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }
}

fn ends_mid_line(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
