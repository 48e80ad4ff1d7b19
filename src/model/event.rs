//! Ledger events: one JSONL line each.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::Job;

/// A single line of the append-only ledger.
///
/// Tagged by `event` so each line is self-describing when read back.
/// `enqueue` carries the whole job; later events reference it by `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Enqueue {
        ts_utc: Timestamp,
        validator_mode: String,
        job: Job,
    },

    Claim {
        ts_utc: Timestamp,
        job_id: String,
        worker_id: String,
        lease_expires_unix: f64,
    },

    Heartbeat {
        ts_utc: Timestamp,
        job_id: String,
        worker_id: String,
        lease_expires_unix: f64,
    },

    Complete {
        ts_utc: Timestamp,
        job_id: String,
        worker_id: String,
        result: serde_json::Value,
    },

    Fail {
        ts_utc: Timestamp,
        job_id: String,
        worker_id: String,
        error: String,
    },
}

impl LedgerEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Enqueue { job, .. } => &job.job_id,
            Self::Claim { job_id, .. }
            | Self::Heartbeat { job_id, .. }
            | Self::Complete { job_id, .. }
            | Self::Fail { job_id, .. } => job_id,
        }
    }

    pub fn ts_utc(&self) -> Timestamp {
        match self {
            Self::Enqueue { ts_utc, .. }
            | Self::Claim { ts_utc, .. }
            | Self::Heartbeat { ts_utc, .. }
            | Self::Complete { ts_utc, .. }
            | Self::Fail { ts_utc, .. } => *ts_utc,
        }
    }

    /// The wire name of this event, as written in the `event` field.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Enqueue { .. } => "enqueue",
            Self::Claim { .. } => "claim",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Fail { .. })
    }
}
