//! Per-job evidence: a JSONL event stream, a Markdown summary, and executor artifacts.
//!
//! ```text
//! <evidence>/
//!   <job_id>.jsonl          # Append-only rows: claimed, progress, complete|failed
//!   <job_id>.md             # Summary, written once on completion
//!   <job_id>_index.jsonl    # repo_index_task output
//! ```
//!
//! Only the claiming worker writes a job's files. Summary and index writes
//! truncate, so a re-offered job that runs again replaces them cleanly.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::budget::{BudgetExceeded, BudgetTracker};

#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("evidence I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("evidence JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Budget(#[from] BudgetExceeded),
}

pub type Result<T> = core::result::Result<T, EvidenceError>;

/// Writes one job's evidence files.
#[derive(Debug, Clone)]
pub struct EvidenceWriter {
    dir: PathBuf,
    job_id: String,
}

impl EvidenceWriter {
    /// Creates the evidence directory if needed.
    pub fn open(dir: impl Into<PathBuf>, job_id: &str) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            job_id: job_id.to_string(),
        })
    }

    pub fn stream_path(&self) -> PathBuf {
        self.dir.join(format!("{}.jsonl", self.job_id))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(format!("{}.md", self.job_id))
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(format!("{}_index.jsonl", self.job_id))
    }

    /// Render one stream row: `ts_utc`, `job_id`, `event`, then `fields`.
    pub fn render_row(&self, event: &str, fields: Value) -> Result<String> {
        let mut row = Map::new();
        row.insert("ts_utc".into(), json!(Timestamp::now()));
        row.insert("job_id".into(), json!(self.job_id));
        row.insert("event".into(), json!(event));
        if let Value::Object(extra) = fields {
            row.extend(extra);
        }
        let mut line = serde_json::to_string(&Value::Object(row))?;
        line.push('\n');
        Ok(line)
    }

    /// Append a row to the stream without charging any budget.
    ///
    /// Used for the worker's own lifecycle rows (`claimed`, `complete`, `failed`).
    pub fn append(&self, event: &str, fields: Value) -> Result<()> {
        let line = self.render_row(event, fields)?;
        self.write_stream_line(&line)
    }

    /// Append a row after charging its size against `max_output_bytes`.
    pub fn append_charged(&self, tracker: &mut BudgetTracker, event: &str, fields: Value) -> Result<()> {
        let line = self.render_row(event, fields)?;
        tracker.record_output_bytes(line.len() as u64)?;
        self.write_stream_line(&line)
    }

    /// Write the summary, replacing any earlier one. Returns its SHA-256 hex digest.
    pub fn write_summary(&self, markdown: &str) -> Result<String> {
        fs::write(self.summary_path(), markdown)?;
        Ok(sha256_hex(markdown.as_bytes()))
    }

    /// Start a fresh index artifact, truncating any earlier one.
    pub fn create_index(&self) -> Result<IndexWriter> {
        let path = self.index_path();
        let file = File::create(&path)?;
        Ok(IndexWriter {
            path,
            out: BufWriter::new(file),
            hasher: Sha256::new(),
            rows: 0,
        })
    }

    fn write_stream_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.stream_path())?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Streams JSONL rows into an index artifact, hashing as it goes.
#[derive(Debug)]
pub struct IndexWriter {
    path: PathBuf,
    out: BufWriter<File>,
    hasher: Sha256,
    rows: u64,
}

impl IndexWriter {
    /// Charge the row against the output budget, then write it.
    pub fn append(&mut self, tracker: &mut BudgetTracker, row: &Value) -> Result<()> {
        let mut line = serde_json::to_string(row)?;
        line.push('\n');
        tracker.record_output_bytes(line.len() as u64)?;
        self.out.write_all(line.as_bytes())?;
        self.hasher.update(line.as_bytes());
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush to disk. Returns the artifact's SHA-256 hex digest.
    pub fn finish(mut self) -> Result<String> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(hex::encode(self.hasher.finalize()))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Read a job's evidence stream. Unparseable lines are skipped.
pub fn read_stream(path: &Path) -> Result<Vec<Value>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(contents
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}
