//! CLI interface for localexec.
//!
//! Every subcommand works on one repo root (`--repo-root`, default `.`):
//!
//! - `localexec worker` runs the claim/execute loop (or one tick with `--once`).
//! - `localexec enqueue` validates a job document and appends it to the ledger.
//! - `localexec status` replays the ledger and prints job states.
//! - `localexec kill-switch on|off|status` manages the claim sentinel.
//!
//! Machine-readable results go to stdout as JSON; diagnostics go to stderr.

mod format;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use jiff::Timestamp;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::layout::StateLayout;
use crate::ledger::{Ledger, now_unix};
use crate::logging;
use crate::worker::Worker;

use format::{format_snapshot, format_totals};

/// localexec: a governed local job queue and worker.
#[derive(Debug, Parser)]
#[command(name = "localexec", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Repository root that owns `workspace/local_exec/`.
    #[arg(long, global = true, default_value = ".")]
    repo_root: PathBuf,

    /// Log at debug level (ignored when `RUST_LOG` is set).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow:
  1. localexec enqueue --demo
     → prints the enqueue event (note the job_id)
  2. localexec worker --once
     → prints {"status": "complete", ...}
  3. localexec status

Stop new claims host-wide:
  localexec kill-switch on"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Claim and execute jobs.
    ///
    /// Always exits 0: job failures are recorded in the ledger and evidence.
    Worker {
        /// Identity recorded on claims (default: config, then `worker-<pid>`).
        #[arg(long)]
        worker_id: Option<String>,

        /// Lease length in seconds.
        #[arg(long)]
        lease_sec: Option<u64>,

        /// Sleep between idle polls, in seconds.
        #[arg(long)]
        poll_sec: Option<f64>,

        /// Process at most one job, print the outcome, and exit.
        #[arg(long)]
        once: bool,
    },

    /// Validate a job and append it to the ledger. Prints the enqueue event.
    Enqueue {
        /// Job document (JSON).
        #[arg(long, conflicts_with = "demo", required_unless_present = "demo")]
        job_file: Option<PathBuf>,

        /// Enqueue a sample `repo_index_task` over `**/*.md`.
        #[arg(long)]
        demo: bool,
    },

    /// Show current job states.
    Status {
        /// Print snapshots as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Engage, release, or inspect the kill switch.
    KillSwitch {
        #[arg(value_enum)]
        action: KillSwitchAction,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KillSwitchAction {
    On,
    Off,
    Status,
}

/// Run the CLI, returning an error message on failure.
pub fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let layout = StateLayout::new(&cli.repo_root);

    match cli.command {
        Command::Worker {
            worker_id,
            lease_sec,
            poll_sec,
            once,
        } => {
            cmd_worker(&layout, cli.debug, worker_id, lease_sec, poll_sec, once);
            Ok(())
        }
        Command::Enqueue { job_file, demo } => {
            logging::init(cli.debug, "warn");
            cmd_enqueue(&layout, job_file.as_deref(), demo)
        }
        Command::Status { json } => cmd_status(&layout, json),
        Command::KillSwitch { action } => cmd_kill_switch(&layout, action),
    }
}

/// Operational errors are reported on stderr; the exit code stays 0.
fn cmd_worker(
    layout: &StateLayout,
    debug: bool,
    worker_id: Option<String>,
    lease_sec: Option<u64>,
    poll_sec: Option<f64>,
    once: bool,
) {
    let config = match Config::load(layout) {
        Ok(c) => c,
        Err(e) => {
            logging::init(debug, "info");
            warn!("{e}; using defaults");
            Config::default()
        }
    };
    logging::init(debug, &config.log_level);

    let worker_id = worker_id.unwrap_or_else(|| config.worker_id());
    let lease_sec = lease_sec.unwrap_or(config.lease_sec).max(1);
    let poll_sec = poll_sec
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(config.poll_sec);

    #[allow(clippy::cast_precision_loss)]
    let worker = match Worker::new(layout.clone(), worker_id, lease_sec as f64) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "failed to open ledger");
            return;
        }
    };

    if once {
        match worker.run_once() {
            Ok(outcome) => println!("{}", to_json(&outcome)),
            Err(e) => {
                warn!(error = %e, "tick failed");
                println!("{}", json!({"status": "error", "error": e.to_string()}));
            }
        }
    } else {
        worker.run_loop(Duration::from_secs_f64(poll_sec), None);
    }
}

fn cmd_enqueue(layout: &StateLayout, job_file: Option<&Path>, demo: bool) -> Result<(), String> {
    let document = match job_file {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            serde_json::from_str::<Value>(&contents)
                .map_err(|e| format!("invalid JSON in {}: {e}", path.display()))?
        }
        None if demo => demo_job(),
        None => return Err("specify --job-file or --demo".to_string()),
    };

    let ledger = Ledger::open(layout).map_err(|e| format!("failed to open ledger: {e}"))?;
    let event = ledger
        .enqueue_job(&document)
        .map_err(|e| format!("job rejected: {e}"))?;

    println!("{}", to_json(&event));
    Ok(())
}

fn cmd_status(layout: &StateLayout, as_json: bool) -> Result<(), String> {
    let ledger = Ledger::open(layout).map_err(|e| format!("failed to open ledger: {e}"))?;
    let now = now_unix();
    let snapshots = ledger
        .snapshots_at(now)
        .map_err(|e| format!("failed to read ledger: {e}"))?;

    if as_json {
        let list: Vec<_> = snapshots.values().collect();
        println!("{}", to_json(&list));
        return Ok(());
    }

    if layout.kill_switch_engaged() {
        println!("kill switch: ON");
    }
    for snap in snapshots.values() {
        println!("{}", format_snapshot(snap, now));
    }
    println!("{}", format_totals(snapshots.values()));
    Ok(())
}

fn cmd_kill_switch(layout: &StateLayout, action: KillSwitchAction) -> Result<(), String> {
    let path = layout.kill_switch_path();
    match action {
        KillSwitchAction::On => {
            fs::create_dir_all(layout.state_dir())
                .map_err(|e| format!("failed to create {}: {e}", layout.state_dir().display()))?;
            fs::write(&path, format!("engaged {}\n", Timestamp::now()))
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        }
        KillSwitchAction::Off => match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(format!("failed to remove {}: {e}", path.display())),
        },
        KillSwitchAction::Status => {}
    }

    let state = if layout.kill_switch_engaged() { "on" } else { "off" };
    println!("kill switch: {state}");
    Ok(())
}

/// A sample `repo_index_task` over the repo's Markdown files.
fn demo_job() -> Value {
    let suffix = Uuid::new_v4().simple().to_string();
    json!({
        "job_id": format!("job-demo-{}", &suffix[..12]),
        "job_type": "repo_index_task",
        "created_at_utc": Timestamp::now().strftime("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "payload": {
            "include_globs": ["**/*.md"],
            "exclude_globs": [],
            "max_files": 200,
            "max_file_bytes": 65536,
            "keywords": [],
        },
        "budgets": {
            "max_wall_time_sec": 60,
            "max_tool_calls": 0,
            "max_output_bytes": 1_048_576,
            "max_concurrency_slots": 1,
        },
        "tool_policy": {
            "allow_network": false,
            "allow_subprocess": false,
            "allowed_tools": [],
        },
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| json!({"error": e.to_string()}).to_string())
}
