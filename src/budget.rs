//! Budget enforcement for executor work.
//!
//! Three ceilings from the job's [`Budgets`] are enforced in-process:
//!
//! - **Wall time**: checked by callers at loop boundaries.
//! - **Tool calls**: one unit per external invocation (each sandboxed subprocess).
//! - **Output bytes**: cumulative bytes the executor writes to evidence or output.
//!
//! All checks are fail-closed and check-then-consume: a charge that would
//! cross a ceiling is refused and leaves the counters untouched. There is no
//! recovery; the error propagates to the worker, which fails the job.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::model::Budgets;

/// Which ceiling was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDimension {
    WallTime,
    ToolCalls,
    OutputBytes,
}

impl BudgetDimension {
    /// The budget field name, as it appears in the job document.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WallTime => "max_wall_time_sec",
            Self::ToolCalls => "max_tool_calls",
            Self::OutputBytes => "max_output_bytes",
        }
    }
}

impl fmt::Display for BudgetDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A budget ceiling would be crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} exceeded")]
pub struct BudgetExceeded(pub BudgetDimension);

pub type Result<T> = core::result::Result<T, BudgetExceeded>;

/// Consumption so far, reported with the job result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetUsage {
    pub elapsed_sec: f64,
    pub tool_calls: u64,
    pub output_bytes: u64,
    pub concurrency_slots: u64,
}

/// Tracks one job's consumption against its budgets.
#[derive(Debug)]
pub struct BudgetTracker {
    budgets: Budgets,
    started: Instant,
    tool_calls: u64,
    output_bytes: u64,
}

impl BudgetTracker {
    /// Starts the wall clock now.
    pub fn new(budgets: Budgets) -> Self {
        Self::started_at(budgets, Instant::now())
    }

    pub fn started_at(budgets: Budgets, started: Instant) -> Self {
        Self {
            budgets,
            started,
            tool_calls: 0,
            output_bytes: 0,
        }
    }

    pub fn budgets(&self) -> &Budgets {
        &self.budgets
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fails once elapsed time is strictly greater than `max_wall_time_sec`.
    pub fn check_wall_time(&self) -> Result<()> {
        let limit = Duration::from_secs(self.budgets.max_wall_time_sec);
        if self.elapsed() > limit {
            return Err(BudgetExceeded(BudgetDimension::WallTime));
        }
        Ok(())
    }

    /// Charge one tool call. With `max_tool_calls = 0` the first call fails.
    pub fn record_tool_call(&mut self) -> Result<()> {
        let next = self.tool_calls.saturating_add(1);
        if next > self.budgets.max_tool_calls {
            return Err(BudgetExceeded(BudgetDimension::ToolCalls));
        }
        self.tool_calls = next;
        Ok(())
    }

    /// Charge `bytes` of output before they are written.
    pub fn record_output_bytes(&mut self, bytes: u64) -> Result<()> {
        let next = self.output_bytes.saturating_add(bytes);
        if next > self.budgets.max_output_bytes {
            return Err(BudgetExceeded(BudgetDimension::OutputBytes));
        }
        self.output_bytes = next;
        Ok(())
    }

    pub fn remaining_output_bytes(&self) -> u64 {
        self.budgets
            .max_output_bytes
            .saturating_sub(self.output_bytes)
    }

    pub fn usage(&self) -> BudgetUsage {
        BudgetUsage {
            elapsed_sec: self.elapsed().as_secs_f64(),
            tool_calls: self.tool_calls,
            output_bytes: self.output_bytes,
            // Execution within a worker is single-threaded.
            concurrency_slots: 1,
        }
    }
}
