//! Output formatting for CLI display.

use crate::model::{JobSnapshot, JobState};

/// One line per snapshot: id, state, type, and who holds it.
pub(super) fn format_snapshot(snap: &JobSnapshot, now: f64) -> String {
    let mut line = format!(
        "{}  [{}]  {}",
        snap.job.job_id,
        snap.state.as_str(),
        snap.job.job_type
    );
    match (snap.state, snap.claimed_by.as_deref()) {
        (JobState::Running, Some(worker)) => {
            let left = snap.lease_expires_unix.map_or(0.0, |exp| (exp - now).max(0.0));
            line.push_str(&format!("  by {worker}, lease {left:.0}s left"));
        }
        (JobState::Complete | JobState::Failed, Some(worker)) => {
            line.push_str(&format!("  by {worker}"));
        }
        _ => {}
    }
    line
}

/// Counts per state, in lifecycle order, skipping zeros.
pub(super) fn format_totals<'a>(snaps: impl IntoIterator<Item = &'a JobSnapshot>) -> String {
    let mut counts = [0usize; 4];
    for snap in snaps {
        counts[snap.state as usize] += 1;
    }
    let states = [
        JobState::Queued,
        JobState::Running,
        JobState::Complete,
        JobState::Failed,
    ];
    let parts: Vec<String> = states
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|(s, n)| format!("{n} {}", s.as_str()))
        .collect();
    if parts.is_empty() {
        "no jobs".to_string()
    } else {
        parts.join(", ")
    }
}
