//! ovsdiag core - offline Open vSwitch state correlation and diagnostics
//!
//! Reconstructs a virtual-switch topology from a captured database snapshot
//! and the text output of `ovs-vsctl`, `ovs-ofctl` and `ovs-appctl`, then
//! derives health signals (active drops, flow-table saturation, port
//! errors) without touching a live system. The implementation prioritizes:
//!
//! 1. **Tolerance** - Partial, stale and malformed input is the normal case
//! 2. **Logging** - Every decision point logged with run context
//! 3. **Determinism** - Same capture, same report
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `parsers` - One parser per dump kind plus snapshot row conversion
//! - `query` - Database snapshot access (`ovsdb-tool` or a JSON export)
//! - `topology` - Dual-source merge into the bridge/port/interface graph
//! - `correlate` - Flows and port counters attached to bridges
//! - `analysis` - Drops, capacity, port health, coverage, pod mapping
//! - `report` - Sectioned machine-readable report
//! - `engine` - Run context and stage orchestration
//! - `logging` - Structured logging with run context

pub mod analysis;
pub mod config;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod parsers;
pub mod query;
pub mod report;
pub mod topology;

use std::path::Path;

pub use config::EngineConfig;
pub use engine::{Engine, RunContext, RunInputs, RunMode};
pub use error::{DiagError, Diagnostic, DiagnosticKind, Result};
pub use report::{Report, RunStatus};

/// Analyze a capture directory in one call.
///
/// `snapshot` overrides the snapshot found in the directory, if any.
pub fn analyze_capture(
    dir: &Path,
    snapshot: Option<&Path>,
    mode: RunMode,
    config: EngineConfig,
) -> Result<Report> {
    let inputs = RunInputs::load_dir(dir, snapshot, &config)?;
    let engine = Engine::new(config)?;
    engine.run(&RunContext::new(mode), inputs)
}
