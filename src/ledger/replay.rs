//! Snapshot reconstruction: fold ledger events, left to right, into job states.

use std::collections::BTreeMap;

use crate::model::{JobSnapshot, JobState, LedgerEvent};

/// Replay `events` (each with its zero-based line index) as of unix time `now`.
///
/// Per event:
///
/// - `enqueue` creates a `queued` snapshot. A repeated `job_id` is ignored.
/// - `claim` marks the job `running` under the claiming worker and lease.
/// - `heartbeat` replaces the lease, but only from the current claim holder.
/// - `complete` / `fail` close the job.
///
/// Terminal states absorb: later events for a closed job are ignored, as
/// are events for a `job_id` that was never enqueued. After the fold, any
/// `running` job whose lease is at or before `now` is demoted to `queued`.
pub fn replay<I>(events: I, now: f64) -> BTreeMap<String, JobSnapshot>
where
    I: IntoIterator<Item = (usize, LedgerEvent)>,
{
    let mut snapshots: BTreeMap<String, JobSnapshot> = BTreeMap::new();

    for (line, event) in events {
        if let LedgerEvent::Enqueue { ts_utc, job, .. } = event {
            snapshots.entry(job.job_id.clone()).or_insert(JobSnapshot {
                job,
                state: JobState::Queued,
                claimed_by: None,
                lease_expires_unix: None,
                updated_ts: ts_utc,
                enqueued_at_line: line,
            });
            continue;
        }

        let Some(snap) = snapshots.get_mut(event.job_id()) else {
            continue;
        };
        if snap.state.is_terminal() {
            continue;
        }

        match event {
            LedgerEvent::Enqueue { .. } => {}
            LedgerEvent::Claim {
                ts_utc,
                worker_id,
                lease_expires_unix,
                ..
            } => {
                snap.state = JobState::Running;
                snap.claimed_by = Some(worker_id);
                snap.lease_expires_unix = Some(lease_expires_unix);
                snap.updated_ts = ts_utc;
            }
            LedgerEvent::Heartbeat {
                ts_utc,
                worker_id,
                lease_expires_unix,
                ..
            } => {
                let holds_claim = snap.state == JobState::Running
                    && snap.claimed_by.as_deref() == Some(worker_id.as_str());
                if holds_claim {
                    snap.lease_expires_unix = Some(lease_expires_unix);
                    snap.updated_ts = ts_utc;
                }
            }
            LedgerEvent::Complete {
                ts_utc, worker_id, ..
            } => close(snap, JobState::Complete, worker_id, ts_utc),
            LedgerEvent::Fail {
                ts_utc, worker_id, ..
            } => close(snap, JobState::Failed, worker_id, ts_utc),
        }
    }

    for snap in snapshots.values_mut() {
        if snap.state == JobState::Running && snap.lease_expires_unix.is_none_or(|exp| exp <= now) {
            snap.state = JobState::Queued;
            snap.claimed_by = None;
            snap.lease_expires_unix = None;
        }
    }

    snapshots
}

fn close(snap: &mut JobSnapshot, state: JobState, worker_id: String, ts_utc: jiff::Timestamp) {
    snap.state = state;
    snap.claimed_by = Some(worker_id);
    snap.lease_expires_unix = None;
    snap.updated_ts = ts_utc;
}
