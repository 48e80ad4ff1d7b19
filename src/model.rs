//! Core data model for the execution plane.
//!
//! These types are the wire and in-memory shapes shared by every layer:
//! jobs as producers submit them, ledger events as they are persisted,
//! and snapshots as replay derives them.

mod event;
mod job;
mod payload;
mod snapshot;

pub use event::LedgerEvent;
pub use job::{Budgets, Job, JobType, TaskError, ToolPolicy};
pub use payload::{DocCompactorPayload, RepoIndexPayload, Task, TestRunnerPayload};
pub use snapshot::{JobSnapshot, JobState};
