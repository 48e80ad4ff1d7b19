//! Fixed on-disk layout under a repo root.
//!
//! ```text
//! <repo>/workspace/local_exec/
//!   config.toml                 # Optional worker defaults
//!   state/jobs.jsonl            # Append-only ledger
//!   state/jobs.lock             # Advisory lock for claim decisions
//!   state/KILL_SWITCH           # Presence disables new claims
//!   evidence/<job_id>.jsonl     # Per-job event stream
//!   evidence/<job_id>.md        # Per-job summary
//!   evidence/<job_id>_index.jsonl
//! ```

use std::path::{Path, PathBuf};

/// Every fixed path the plane reads or writes, derived from one repo root.
#[derive(Debug, Clone)]
pub struct StateLayout {
    repo_root: PathBuf,
}

impl StateLayout {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn base_dir(&self) -> PathBuf {
        self.repo_root.join("workspace").join("local_exec")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.base_dir().join("state")
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.base_dir().join("evidence")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir().join("jobs.jsonl")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("jobs.lock")
    }

    pub fn kill_switch_path(&self) -> PathBuf {
        self.state_dir().join("KILL_SWITCH")
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_dir().join("config.toml")
    }

    pub fn kill_switch_engaged(&self) -> bool {
        self.kill_switch_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_local_exec() {
        let layout = StateLayout::new("/repo");
        assert_eq!(
            layout.ledger_path(),
            PathBuf::from("/repo/workspace/local_exec/state/jobs.jsonl")
        );
        assert_eq!(
            layout.kill_switch_path(),
            PathBuf::from("/repo/workspace/local_exec/state/KILL_SWITCH")
        );
        assert_eq!(
            layout.evidence_dir(),
            PathBuf::from("/repo/workspace/local_exec/evidence")
        );
    }
}
