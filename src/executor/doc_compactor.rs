//! `doc_compactor_task`: fold input documents into one bounded Markdown summary.
//!
//! Inputs are read in order until `max_input_bytes` is spent; the input that
//! crosses the limit is cut short and later inputs are skipped. Each input
//! read gets a `## <path>` section. The rendered summary is cut to
//! `max_output_bytes`, byte-precise, with invalid UTF-8 replaced.

use std::fs::File;
use std::io::Read;

use serde_json::json;
use tracing::info;

use super::{ExecContext, ExecError, ExecOutcome, Result};
use crate::model::DocCompactorPayload;
use crate::sandbox::{resolve_repo_path, truncate_lossy};

pub(super) fn run(payload: &DocCompactorPayload, ctx: &mut ExecContext<'_>) -> Result<ExecOutcome> {
    let mut remaining = payload.max_input_bytes;
    let mut sections: Vec<(String, Vec<u8>)> = Vec::new();
    let mut skipped = 0usize;

    for input in &payload.inputs {
        ctx.checkpoint()?;
        if remaining == 0 {
            skipped += 1;
            continue;
        }

        let path = resolve_repo_path(ctx.repo_root, input)?;
        let file = File::open(&path).map_err(|e| ExecError::Runtime(format!("{input}: {e}")))?;
        let mut buf = Vec::new();
        file.take(remaining)
            .read_to_end(&mut buf)
            .map_err(|e| ExecError::Runtime(format!("{input}: {e}")))?;
        remaining -= buf.len() as u64;
        sections.push((input.clone(), buf));
    }

    let input_bytes = payload.max_input_bytes - remaining;
    let rendered = render(payload.title.as_deref(), &sections);
    let max_output = usize::try_from(payload.max_output_bytes).unwrap_or(usize::MAX);
    // `rendered` is valid UTF-8, so the cut backs off to a character boundary
    // and the summary never exceeds `max_output`.
    let (summary, truncated) = truncate_lossy(rendered.as_bytes(), max_output);

    info!(
        job_id = %ctx.job.job_id,
        inputs = sections.len(),
        input_bytes,
        truncated,
        "documents compacted"
    );

    Ok(ExecOutcome {
        result: json!({
            "inputs_read": sections.len(),
            "inputs_skipped": skipped,
            "input_bytes": input_bytes,
            "summary_bytes": summary.len(),
            "summary_truncated": truncated,
        }),
        summary,
        artifacts: Vec::new(),
    })
}

fn render(title: Option<&str>, sections: &[(String, Vec<u8>)]) -> String {
    let mut md = String::new();
    if let Some(title) = title {
        md.push_str(&format!("# {title}\n\n"));
    }
    for (path, body) in sections {
        md.push_str(&format!("## {path}\n\n"));
        md.push_str(&String::from_utf8_lossy(body));
        if !md.ends_with('\n') {
            md.push('\n');
        }
        md.push('\n');
    }
    md
}
