//! Report data model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::analysis::{
    CoverageRate, DropReport, Finding, FlowTableHealth, InterfaceIssue, PodMappingReport,
    PortHealth,
};
use crate::engine::RunMode;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::model::{Flow, SystemInfo, Topology, TunnelPort};

/// One report section and whether it could be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Section<T> {
    Available { data: T },
    /// The inputs were expected but could not be used.
    Unavailable { reason: String },
    /// Not attempted: no input of that kind, or the mode skipped it.
    Omitted { reason: String },
}

impl<T> Section<T> {
    pub fn available(data: T) -> Self {
        Section::Available { data }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Section::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn omitted(reason: impl Into<String>) -> Self {
        Section::Omitted {
            reason: reason.into(),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Available { data } => Some(data),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Section::Unavailable { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Section::Available { .. } => None,
            Section::Unavailable { reason } | Section::Omitted { reason } => Some(reason),
        }
    }
}

/// Overall outcome, mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    /// Completed, but something was skipped, rejected or contradictory.
    Warnings,
    Fatal,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Fatal => 1,
            RunStatus::Warnings => 2,
        }
    }
}

/// What happened to one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputStatus {
    Parsed,
    /// The parser refused the whole input.
    Rejected,
    /// File name matches no known dump kind.
    Unrecognised,
    /// Not consulted in this run's mode.
    Skipped,
    /// Snapshot could not be queried.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSummary {
    pub name: String,
    /// Dump kind, or `snapshot`; absent for unrecognised files.
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    pub records: usize,
    pub issues: usize,
    pub status: InputStatus,
}

impl InputSummary {
    /// Summary of a text input, fingerprinted by content.
    pub fn for_content(name: &str, kind: Option<String>, content: &str, status: InputStatus) -> Self {
        Self {
            name: name.to_string(),
            kind,
            sha256: Some(compute_hash(content)),
            bytes: Some(content.len()),
            records: 0,
            issues: 0,
            status,
        }
    }
}

/// SHA-256 of content as lowercase hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Snapshot origin and per-table row counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub origin: String,
    pub tables: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSummary {
    pub bridge: String,
    #[serde(flatten)]
    pub tunnel: TunnelPort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySection {
    pub bridge_count: usize,
    pub port_count: usize,
    pub interface_count: usize,
    pub graph: Topology,
    pub tunnels: Vec<TunnelSummary>,
    pub interface_issues: Vec<InterfaceIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeFlowStats {
    pub bridge: String,
    /// False for flows naming a bridge the topology does not know.
    pub attached: bool,
    pub total_flows: usize,
    pub flows_with_hits: usize,
    /// Flow count per OpenFlow table.
    pub tables: BTreeMap<u8, usize>,
    pub top_flows: Vec<Flow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortHealthSection {
    pub ports_reported: usize,
    pub flagged: Vec<PortHealth>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    pub total: usize,
    pub by_kind: BTreeMap<DiagnosticKind, usize>,
    pub entries: Vec<Diagnostic>,
}

impl DiagnosticSummary {
    pub fn new(entries: Vec<Diagnostic>) -> Self {
        let mut by_kind = BTreeMap::new();
        for d in &entries {
            *by_kind.entry(d.kind).or_insert(0) += 1;
        }
        Self {
            total: entries.len(),
            by_kind,
            entries,
        }
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Any entry that should turn success into "ran with warnings".
    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(|d| !d.kind.is_informational())
    }
}

/// Machine-readable result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub mode: RunMode,
    pub status: RunStatus,
    pub inputs: Vec<InputSummary>,
    pub system: Section<SystemInfo>,
    pub database: Section<DatabaseSummary>,
    pub topology: Section<TopologySection>,
    pub flow_stats: Section<Vec<BridgeFlowStats>>,
    pub drops: Section<DropReport>,
    pub port_health: Section<PortHealthSection>,
    pub flow_table_health: Section<Vec<FlowTableHealth>>,
    pub coverage: Section<Vec<CoverageRate>>,
    pub pod_mapping: Section<PodMappingReport>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw_query: Option<Value>,
    pub findings: Vec<Finding>,
    pub diagnostics: DiagnosticSummary,
}

impl Report {
    /// Whether any section was expected but could not be produced.
    pub fn has_unavailable_section(&self) -> bool {
        [
            self.system.is_unavailable(),
            self.database.is_unavailable(),
            self.topology.is_unavailable(),
            self.flow_stats.is_unavailable(),
            self.drops.is_unavailable(),
            self.port_health.is_unavailable(),
            self.flow_table_health.is_unavailable(),
            self.coverage.is_unavailable(),
            self.pod_mapping.is_unavailable(),
        ]
        .into_iter()
        .any(|u| u)
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash("port  1: rx pkts=1\n");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            compute_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_section_serialises_with_status_tag() {
        let available: Section<Vec<u32>> = Section::available(vec![1, 2]);
        let value = serde_json::to_value(&available).unwrap();
        assert_eq!(value["status"], "available");
        assert_eq!(value["data"], serde_json::json!([1, 2]));

        let unavailable: Section<Vec<u32>> = Section::unavailable("tool missing");
        let value = serde_json::to_value(&unavailable).unwrap();
        assert_eq!(value["status"], "unavailable");
        assert_eq!(value["reason"], "tool missing");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::Fatal.exit_code(), 1);
        assert_eq!(RunStatus::Warnings.exit_code(), 2);
    }

    #[test]
    fn test_diagnostic_summary_counts() {
        let summary = DiagnosticSummary::new(vec![
            Diagnostic::new(DiagnosticKind::SourceMissing, "coverage", "absent"),
            Diagnostic::malformed_line("flows", 3, "bad"),
            Diagnostic::malformed_line("flows", 9, "bad"),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.count(DiagnosticKind::ParseWarning), 2);
        assert!(summary.has_warnings());

        let informational = DiagnosticSummary::new(vec![Diagnostic::new(
            DiagnosticKind::SourceMissing,
            "coverage",
            "absent",
        )]);
        assert!(!informational.has_warnings());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["by_kind"]["parse_warning"], 2);
    }
}
