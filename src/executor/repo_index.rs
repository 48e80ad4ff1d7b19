//! `repo_index_task`: walk the repo, scan file heads, record keyword hits.
//!
//! Enumeration respects `.gitignore` (via the `ignore` crate), is narrowed by
//! `include_globs` and widened-out by `exclude_globs`, and never descends into
//! `.git/` or the plane's own `workspace/local_exec/` tree. Paths are visited
//! in sorted order, so `max_files` always keeps the same prefix.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use serde_json::json;
use tracing::{debug, info};

use super::{Artifact, ExecContext, ExecError, ExecOutcome, Result};
use crate::model::RepoIndexPayload;

pub(super) fn run(payload: &RepoIndexPayload, ctx: &mut ExecContext<'_>) -> Result<ExecOutcome> {
    let root = ctx
        .repo_root
        .canonicalize()
        .map_err(|e| ExecError::Runtime(format!("repo root unreadable: {e}")))?;
    let max_files = usize::try_from(payload.max_files).unwrap_or(usize::MAX);

    let files = list_files(&root, payload)?;
    let capped = files.len() > max_files;

    let mut index = ctx.evidence.create_index()?;
    let mut considered = 0u64;
    for path in files.into_iter().take(max_files) {
        ctx.checkpoint()?;
        considered += 1;

        let Some(buf) = read_head(&path, payload.max_file_bytes) else {
            continue;
        };
        let text = String::from_utf8_lossy(&buf);
        let hits: Vec<&str> = payload
            .keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .map(String::as_str)
            .collect();
        if !payload.keywords.is_empty() && hits.is_empty() {
            continue;
        }

        let row = json!({
            "path": ctx.relative_display(&path),
            "bytes_scanned": buf.len(),
            "keyword_hits": hits,
        });
        index.append(ctx.budget, &row)?;
    }

    let rows = index.rows();
    let index_path = ctx.relative_display(index.path());
    let digest = index.finish()?;
    info!(job_id = %ctx.job.job_id, considered, rows, capped, "repo index written");

    ctx.record(
        "indexed",
        json!({"files_considered": considered, "rows_written": rows}),
    )?;

    let summary = format!(
        "# Repo index: {job_id}\n\n\
         - Files considered: {considered}\n\
         - Rows written: {rows}\n\
         - Capped at max_files: {capped}\n\
         - Index: `{index_path}`\n",
        job_id = ctx.job.job_id,
    );

    Ok(ExecOutcome {
        result: json!({
            "files_considered": considered,
            "rows_written": rows,
            "capped": capped,
            "index_path": index_path,
            "index_sha256": digest,
        }),
        summary,
        artifacts: vec![Artifact {
            kind: "index",
            path: index_path,
            sha256: digest,
        }],
    })
}

/// Every matching regular file under `root`, sorted.
fn list_files(root: &Path, payload: &RepoIndexPayload) -> Result<Vec<PathBuf>> {
    let overrides = build_overrides(root, payload)?;
    let plane_dir = root.join("workspace").join("local_exec");

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .overrides(overrides)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !(is_dir && (entry.file_name() == ".git" || entry.path() == plane_dir))
        })
        .sort_by_file_name(Ord::cmp)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "skipping unreadable entry"),
        }
    }
    files.sort();
    Ok(files)
}

/// Include globs whitelist; exclude globs are added negated so they win.
fn build_overrides(root: &Path, payload: &RepoIndexPayload) -> Result<Override> {
    let mut builder = OverrideBuilder::new(root);
    for glob in &payload.include_globs {
        builder
            .add(glob)
            .map_err(|e| ExecError::Runtime(format!("invalid include glob {glob}: {e}")))?;
    }
    for glob in &payload.exclude_globs {
        builder
            .add(&format!("!{glob}"))
            .map_err(|e| ExecError::Runtime(format!("invalid exclude glob {glob}: {e}")))?;
    }
    builder
        .build()
        .map_err(|e| ExecError::Runtime(format!("invalid globs: {e}")))
}

/// Up to `max` bytes from the start of `path`. Unreadable files are skipped.
fn read_head(path: &Path, max: u64) -> Option<Vec<u8>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping unreadable file");
            return None;
        }
    };
    let mut buf = Vec::new();
    match file.take(max).read_to_end(&mut buf) {
        Ok(_) => Some(buf),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping unreadable file");
            None
        }
    }
}
