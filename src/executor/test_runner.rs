//! `test_runner_task`: run each argv command through the sandbox.
//!
//! A non-zero return code is reported, not raised. The job fails only when
//! policy, sandbox, or budget refuses to go on.

use std::time::Duration;

use serde_json::json;
use tracing::info;

use super::{ExecContext, ExecError, ExecOutcome, Result};
use crate::model::TestRunnerPayload;
use crate::sandbox::{self, CommandOutcome, SandboxOptions};

pub(super) fn run(payload: &TestRunnerPayload, ctx: &mut ExecContext<'_>) -> Result<ExecOutcome> {
    ctx.job.tool_policy.require_subprocess()?;

    let max_output_bytes = usize::try_from(ctx.budget.budgets().max_output_bytes).unwrap_or(usize::MAX);
    let mut outcomes: Vec<CommandOutcome> = Vec::with_capacity(payload.commands.len());

    for argv in &payload.commands {
        ctx.checkpoint()?;
        ctx.budget.record_tool_call()?;

        let options = SandboxOptions {
            repo_root: ctx.repo_root,
            cwd: payload.cwd.as_deref(),
            timeout: Duration::from_secs(payload.timeout_sec),
            env_allowlist: &payload.env_allow,
            max_output_bytes,
        };
        let outcome = sandbox::run_argv(argv, &options)?;
        info!(
            job_id = %ctx.job.job_id,
            argv = ?outcome.argv,
            returncode = ?outcome.returncode,
            timed_out = outcome.timed_out,
            "command finished"
        );

        let row = serde_json::to_value(&outcome).map_err(|e| ExecError::Runtime(e.to_string()))?;
        ctx.record("command", row)?;
        outcomes.push(outcome);
    }

    let passed = outcomes
        .iter()
        .filter(|o| o.returncode == Some(0))
        .count();
    let summary = render_summary(&ctx.job.job_id, &outcomes);

    Ok(ExecOutcome {
        result: json!({
            "commands_run": outcomes.len(),
            "commands_passed": passed,
            "commands": outcomes,
        }),
        summary,
        artifacts: Vec::new(),
    })
}

fn render_summary(job_id: &str, outcomes: &[CommandOutcome]) -> String {
    let mut md = format!("# Test run: {job_id}\n\n");
    for o in outcomes {
        let status = match (o.timed_out, o.returncode) {
            (true, _) => "timed out".to_string(),
            (false, Some(rc)) => format!("rc={rc}"),
            (false, None) => "killed by signal".to_string(),
        };
        md.push_str(&format!(
            "- `{}`: {status} ({:.2}s)\n",
            o.argv.join(" "),
            o.duration_sec
        ));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;
    use tempfile::TempDir;

    use crate::budget::BudgetTracker;
    use crate::evidence::{EvidenceWriter, read_stream};
    use crate::model::{Job, Task};
    use crate::test_support::runner_job;

    fn run_job(job: &Job) -> (TempDir, Result<ExecOutcome>, Vec<Value>) {
        let dir = TempDir::new().unwrap();
        let Task::TestRunner(payload) = job.task().unwrap() else {
            panic!("expected test runner task");
        };
        let evidence = EvidenceWriter::open(dir.path().join("evidence"), &job.job_id).unwrap();
        let mut budget = BudgetTracker::new(job.budgets);
        let mut ctx = ExecContext::new(dir.path(), job, &evidence, &mut budget);
        let outcome = run(&payload, &mut ctx);
        let rows = read_stream(&evidence.stream_path()).unwrap();
        (dir, outcome, rows)
    }

    #[test]
    fn runs_every_command_and_keeps_nonzero_codes() {
        let job = runner_job(
            "job-runner-00000001",
            &[&["echo", "hello"], &["sh", "-c", "exit 3"]],
            true,
        );
        let (_dir, outcome, rows) = run_job(&job);

        let outcome = outcome.unwrap();
        assert_eq!(outcome.result["commands_run"], 2);
        assert_eq!(outcome.result["commands_passed"], 1);
        assert_eq!(outcome.result["commands"][0]["stdout"], "hello\n");
        assert_eq!(outcome.result["commands"][1]["returncode"], 3);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["event"] == "command"));
        assert!(outcome.summary.contains("`sh -c exit 3`: rc=3"));
    }

    #[test]
    fn subprocess_permission_is_checked_first() {
        let job = runner_job("job-runner-00000002", &[&["echo", "hi"]], false);
        let (_dir, outcome, rows) = run_job(&job);

        let err = outcome.unwrap_err();
        assert_eq!(err.to_string(), "subprocess_not_allowed");
        assert!(rows.is_empty());
    }

    #[test]
    fn zero_tool_calls_fails_on_first_command() {
        let mut job = runner_job("job-runner-00000003", &[&["echo", "hi"]], true);
        job.budgets.max_tool_calls = 0;
        let (_dir, outcome, rows) = run_job(&job);

        assert_eq!(outcome.unwrap_err().to_string(), "max_tool_calls exceeded");
        assert!(rows.is_empty());
    }

    #[test]
    fn tool_calls_stop_midway() {
        let mut job = runner_job(
            "job-runner-00000004",
            &[&["echo", "1"], &["echo", "2"], &["echo", "3"]],
            true,
        );
        job.budgets.max_tool_calls = 2;
        let (_dir, outcome, rows) = run_job(&job);

        assert_eq!(outcome.unwrap_err().to_string(), "max_tool_calls exceeded");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn sandbox_rejection_fails_the_job() {
        let job = runner_job("job-runner-00000005", &[&["echo hello"]], true);
        let (_dir, outcome, _) = run_job(&job);

        let err = outcome.unwrap_err();
        assert!(matches!(err, ExecError::Sandbox(_)));
        assert_eq!(err.to_string(), "argv_rejected:shell_like");
    }
}
