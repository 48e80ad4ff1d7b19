//! Job builders shared by unit tests.

use serde_json::{Value, json};

use crate::model::{Budgets, Job, ToolPolicy};

pub fn budgets() -> Budgets {
    Budgets {
        max_wall_time_sec: 60,
        max_tool_calls: 8,
        max_output_bytes: 1 << 20,
        max_concurrency_slots: 1,
    }
}

pub fn policy(allow_subprocess: bool) -> ToolPolicy {
    ToolPolicy {
        allow_network: false,
        allow_subprocess,
        allowed_tools: vec![],
    }
}

pub fn job(job_id: &str, job_type: &str, payload: Value) -> Job {
    Job {
        job_id: job_id.into(),
        job_type: job_type.into(),
        created_at_utc: "2026-01-01T00:00:00Z".into(),
        payload,
        budgets: budgets(),
        tool_policy: policy(false),
    }
}

pub fn doc_job(job_id: &str, inputs: &[&str]) -> Job {
    job(
        job_id,
        "doc_compactor_task",
        json!({"inputs": inputs, "max_input_bytes": 1024, "max_output_bytes": 2048}),
    )
}

pub fn runner_job(job_id: &str, commands: &[&[&str]], allow_subprocess: bool) -> Job {
    let mut j = job(
        job_id,
        "test_runner_task",
        json!({"commands": commands, "timeout_sec": 10}),
    );
    j.tool_policy = policy(allow_subprocess);
    j
}

pub fn index_job(job_id: &str, payload: Value) -> Job {
    job(job_id, "repo_index_task", payload)
}
