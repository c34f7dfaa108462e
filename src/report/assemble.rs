//! Report assembly.
//!
//! Decides for every section whether it is available, unavailable or
//! omitted, and computes the overall status. No analysis happens here.

use std::collections::BTreeSet;

use chrono::Utc;
use serde_json::Value;

use crate::analysis::Analysis;
use crate::correlate::CorrelatedModel;
use crate::engine::{RunContext, RunMode};
use crate::error::{DiagError, Diagnostic};
use crate::parsers::DumpTag;

use super::model::{
    BridgeFlowStats, DatabaseSummary, DiagnosticSummary, InputSummary, PortHealthSection, Report,
    RunStatus, Section, TopologySection, TunnelSummary,
};

/// What the snapshot stage achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseState {
    /// The mode does not consult the snapshot.
    NotConsulted,
    /// No snapshot in the capture.
    Missing,
    /// A snapshot exists but could not be queried.
    Failed { reason: String },
    Loaded(DatabaseSummary),
}

impl DatabaseState {
    fn failure(&self) -> Option<&str> {
        match self {
            DatabaseState::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Which dump kinds the parse stage read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextState {
    pub consulted: bool,
    /// Kinds with at least one input parsed.
    pub parsed: BTreeSet<DumpTag>,
    /// Kinds with at least one input rejected.
    pub rejected: BTreeSet<DumpTag>,
}

impl TextState {
    fn section<T>(&self, mode: RunMode, tags: &[DumpTag], data: impl FnOnce() -> T) -> Section<T> {
        if !self.consulted {
            return Section::omitted(format!("text dumps are not read in {} mode", mode));
        }
        if tags.iter().any(|t| self.parsed.contains(t)) {
            return Section::available(data());
        }
        let names = tags.iter().map(DumpTag::as_str).collect::<Vec<_>>().join("/");
        if tags.iter().any(|t| self.rejected.contains(t)) {
            Section::unavailable(format!("every {} dump was rejected", names))
        } else {
            Section::omitted(format!("no {} dump in capture", names))
        }
    }

    fn has_topology_dump(&self) -> bool {
        self.parsed.contains(&DumpTag::TopologyShow) || self.parsed.contains(&DumpTag::TableList)
    }
}

/// Everything a finished run hands to the assembler.
#[derive(Debug, Clone)]
pub struct ReportParts {
    pub inputs: Vec<InputSummary>,
    pub database: DatabaseState,
    pub text: TextState,
    pub model: CorrelatedModel,
    pub analysis: Analysis,
    pub diagnostics: Vec<Diagnostic>,
}

fn flow_stats(model: &CorrelatedModel) -> Vec<BridgeFlowStats> {
    let mut stats: Vec<BridgeFlowStats> = model
        .bridges
        .values()
        .map(|activity| BridgeFlowStats {
            bridge: activity.bridge.clone(),
            attached: true,
            total_flows: activity.total_flows,
            flows_with_hits: activity.flows_with_hits,
            tables: activity
                .tables
                .iter()
                .map(|(table, flows)| (*table, flows.len()))
                .collect(),
            top_flows: activity.top_flows.clone(),
        })
        .collect();

    for (bridge, flows) in &model.unattached_flows {
        let mut tables = std::collections::BTreeMap::new();
        for flow in flows {
            *tables.entry(flow.table).or_insert(0) += 1;
        }
        stats.push(BridgeFlowStats {
            bridge: bridge.clone(),
            attached: false,
            total_flows: flows.len(),
            flows_with_hits: flows.iter().filter(|f| f.packet_count > 0).count(),
            tables,
            top_flows: Vec::new(),
        });
    }
    stats
}

fn topology_section(parts: &ReportParts) -> Section<TopologySection> {
    let topology = &parts.model.topology;
    let has_graph = !topology.bridges.is_empty()
        || !topology.orphan_ports.is_empty()
        || !topology.orphan_interfaces.is_empty();
    let database_loaded = matches!(parts.database, DatabaseState::Loaded(_));

    if !has_graph && !database_loaded && !parts.text.has_topology_dump() {
        return Section::unavailable("no bridge, port or interface records from any source");
    }

    Section::available(TopologySection {
        bridge_count: topology.bridges.len(),
        port_count: topology.port_count(),
        interface_count: topology.interface_count(),
        graph: topology.clone(),
        tunnels: topology
            .tunnel_ports()
            .into_iter()
            .map(|(bridge, tunnel)| TunnelSummary { bridge, tunnel })
            .collect(),
        interface_issues: parts.analysis.interface_issues.clone(),
    })
}

/// Build the report for a completed run.
pub fn assemble(run: &RunContext, parts: ReportParts) -> Report {
    let mode = run.mode;
    let model = &parts.model;
    let analysis = &parts.analysis;

    let system = match (&model.topology.system, parts.database.failure()) {
        (Some(system), _) => Section::available(system.clone()),
        (None, Some(reason)) => Section::unavailable(reason.to_string()),
        (None, None) => Section::omitted("no Open_vSwitch record in inputs"),
    };

    let database = match &parts.database {
        DatabaseState::Loaded(summary) => Section::available(summary.clone()),
        DatabaseState::Failed { reason } => Section::unavailable(reason.clone()),
        DatabaseState::Missing => Section::omitted("no database snapshot in capture"),
        DatabaseState::NotConsulted => {
            Section::omitted(format!("database snapshot is not read in {} mode", mode))
        }
    };

    let flow_table_health = if analysis.flow_tables.is_empty() {
        Section::unavailable("no capacity report, configured flow limit or flow dump")
    } else {
        Section::available(analysis.flow_tables.clone())
    };

    let pod_mapping = if model.topology.all_interfaces().is_empty() {
        Section::omitted("no interfaces to map")
    } else {
        Section::available(analysis.pods.clone())
    };

    let mut report = Report {
        run_id: run.run_id.clone(),
        started_at: run.started_at,
        generated_at: Utc::now(),
        mode,
        status: RunStatus::Success,
        inputs: parts.inputs.clone(),
        system,
        database,
        topology: topology_section(&parts),
        flow_stats: parts.text.section(mode, &[DumpTag::Flows], || flow_stats(model)),
        drops: parts
            .text
            .section(mode, &[DumpTag::Flows], || analysis.drops.clone()),
        port_health: parts.text.section(mode, &[DumpTag::PortStats], || PortHealthSection {
            ports_reported: model.all_port_stats().count(),
            flagged: analysis.port_health.clone(),
        }),
        flow_table_health,
        coverage: parts
            .text
            .section(mode, &[DumpTag::Coverage], || analysis.coverage.clone()),
        pod_mapping,
        raw_query: None,
        findings: analysis.findings.clone(),
        diagnostics: DiagnosticSummary::new(parts.diagnostics),
    };

    report.status = if report.diagnostics.has_warnings() || report.has_unavailable_section() {
        RunStatus::Warnings
    } else {
        RunStatus::Success
    };
    report
}

fn skeleton(run: &RunContext, reason: &str, unavailable: bool) -> Report {
    fn section<T>(reason: &str, unavailable: bool) -> Section<T> {
        if unavailable {
            Section::unavailable(reason)
        } else {
            Section::omitted(reason)
        }
    }
    Report {
        run_id: run.run_id.clone(),
        started_at: run.started_at,
        generated_at: Utc::now(),
        mode: run.mode,
        status: RunStatus::Success,
        inputs: Vec::new(),
        system: section(reason, unavailable),
        database: section(reason, unavailable),
        topology: section(reason, unavailable),
        flow_stats: section(reason, unavailable),
        drops: section(reason, unavailable),
        port_health: section(reason, unavailable),
        flow_table_health: section(reason, unavailable),
        coverage: section(reason, unavailable),
        pod_mapping: section(reason, unavailable),
        raw_query: None,
        findings: Vec::new(),
        diagnostics: DiagnosticSummary::default(),
    }
}

/// Report for a raw query run: the reply verbatim, every section omitted.
pub fn raw_query_report(
    run: &RunContext,
    inputs: Vec<InputSummary>,
    reply: Option<Value>,
    diagnostics: Vec<Diagnostic>,
) -> Report {
    let mut report = skeleton(run, "raw query mode", false);
    report.inputs = inputs;
    report.raw_query = reply;
    report.diagnostics = DiagnosticSummary::new(diagnostics);
    report.status = if report.raw_query.is_none() || report.diagnostics.has_warnings() {
        RunStatus::Warnings
    } else {
        RunStatus::Success
    };
    report
}

/// Report for a run that could not complete.
pub fn fatal_report(run: &RunContext, error: &DiagError) -> Report {
    let reason = error.to_string();
    let mut report = skeleton(run, &reason, true);
    report.status = RunStatus::Fatal;
    report.diagnostics = DiagnosticSummary::new(vec![error.to_diagnostic("engine")]);
    report
}
