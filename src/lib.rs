//! localexec: a governed local execution plane.
//!
//! Producers enqueue validated jobs into an append-only JSONL ledger. Workers
//! claim them under an advisory file lock, hold a lease while they run, and
//! execute them under hard budgets and a tool policy. Every job leaves an
//! evidence trail next to the ledger.
//!
//! ```text
//! enqueue ──► ledger (jobs.jsonl) ──► claim ──► executor ──► complete | fail
//!                                        │           │
//!                                        └── lease ──┴── evidence/<job_id>.*
//! ```

pub mod budget;
pub mod cli;
pub mod config;
pub mod evidence;
pub mod executor;
pub mod layout;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod policy;
pub mod sandbox;
pub mod validate;
pub mod worker;

#[cfg(test)]
mod test_support;
