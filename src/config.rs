//! Worker configuration.
//!
//! Loaded from `workspace/local_exec/config.toml` under the repo root. The
//! file is optional; every key has a default and CLI flags override it.
//!
//! ```toml
//! worker-id = "builder-1"
//! lease-sec = 300
//! poll-sec = 2.0
//! log-level = "info"
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::layout::StateLayout;

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Identity recorded on claims. Defaults to `worker-<pid>`.
    pub worker_id: Option<String>,

    /// Seconds a claim stays authoritative without a heartbeat.
    pub lease_sec: u64,

    /// Seconds the daemon loop sleeps when there is nothing to do.
    pub poll_sec: f64,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_id: None,
            lease_sec: 300,
            poll_sec: 2.0,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load `config.toml` for `layout`, or defaults if the file doesn't exist.
    pub fn load(layout: &StateLayout) -> Result<Self, String> {
        Self::load_from(&layout.config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        let config: Self = toml::from_str(&contents)
            .map_err(|e| format!("invalid config at {}: {e}", path.display()))?;
        config
            .validate()
            .map_err(|e| format!("invalid config at {}: {e}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.lease_sec < 1 {
            return Err("lease-sec must be at least 1".to_string());
        }
        if !(self.poll_sec.is_finite() && self.poll_sec > 0.0) {
            return Err("poll-sec must be a positive number".to_string());
        }
        if self.worker_id.as_deref().is_some_and(str::is_empty) {
            return Err("worker-id must not be empty".to_string());
        }
        Ok(())
    }

    /// The configured worker id, or `worker-<pid>`.
    pub fn worker_id(&self) -> String {
        self.worker_id
            .clone()
            .unwrap_or_else(|| format!("worker-{}", std::process::id()))
    }
}
