//! Analysis orchestrator.
//!
//! Owns the run context and drives the stages in order: parallel parse,
//! snapshot queries, topology, correlation, analysis, report.

pub mod context;
pub mod run;

pub use context::{RunContext, RunMode};
pub use run::{DumpFile, Engine, RunInputs, SnapshotSource, SNAPSHOT_DB_NAME, SNAPSHOT_EXPORT_NAME};
