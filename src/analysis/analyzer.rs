use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::correlate::CorrelatedModel;
use crate::logging::LogContext;

use super::capacity::{flow_table_health, CapacityStatus, FlowTableHealth};
use super::coverage::{coverage_rates, CoverageRate};
use super::drops::{classify_drops, DropReport};
use super::findings::{sort_findings, Finding, FindingCode};
use super::pod_mapping::{map_pods, PodMappingReport, PodMatcher};
use super::port_health::{flagged_ports, interface_issues, InterfaceIssue, InterfaceProblem, PortHealth};

/// Everything the analyzer derives from one correlated model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub drops: DropReport,
    pub port_health: Vec<PortHealth>,
    pub interface_issues: Vec<InterfaceIssue>,
    pub flow_tables: Vec<FlowTableHealth>,
    pub coverage: Vec<CoverageRate>,
    pub pods: PodMappingReport,
    /// Sorted errors first.
    pub findings: Vec<Finding>,
}

fn drop_findings(drops: &DropReport, findings: &mut Vec<Finding>) {
    for rule in &drops.active {
        findings.push(
            Finding::new(
                FindingCode::ActiveDrop,
                format!(
                    "drop rule on {} table {} matched {} packets",
                    rule.bridge, rule.table, rule.packet_count
                ),
            )
            .with("bridge", &rule.bridge)
            .with("table", rule.table)
            .with("priority", rule.priority)
            .with("match", &rule.match_expr)
            .with("packets", rule.packet_count),
        );
    }

    let mut inactive: BTreeMap<&str, usize> = BTreeMap::new();
    for rule in &drops.inactive {
        *inactive.entry(rule.bridge.as_str()).or_default() += 1;
    }
    for (bridge, count) in inactive {
        findings.push(
            Finding::new(
                FindingCode::InactiveDrop,
                format!("{} drop rules on {} are configured but never matched", count, bridge),
            )
            .with("bridge", bridge)
            .with("rules", count),
        );
    }
}

fn port_findings(ports: &[PortHealth], findings: &mut Vec<Finding>) {
    for port in ports {
        findings.push(
            Finding::new(
                FindingCode::PortErrors,
                format!(
                    "port {} on {}: rx_drops={} rx_errors={} tx_drops={} tx_errors={}",
                    port.port, port.bridge, port.rx_drops, port.rx_errors, port.tx_drops, port.tx_errors
                ),
            )
            .with("bridge", &port.bridge)
            .with("port", &port.port),
        );
    }
}

fn interface_findings(issues: &[InterfaceIssue], findings: &mut Vec<Finding>) {
    for issue in issues {
        let bridge = issue.bridge.as_deref().unwrap_or("none");
        let finding = match issue.problem {
            InterfaceProblem::Error => Finding::new(
                FindingCode::InterfaceError,
                format!(
                    "interface {} reports error: {}",
                    issue.interface,
                    issue.detail.as_deref().unwrap_or("")
                ),
            ),
            InterfaceProblem::LinkDown => Finding::new(
                FindingCode::LinkDown,
                format!("interface {} link is down", issue.interface),
            ),
        };
        findings.push(finding.with("bridge", bridge).with("interface", &issue.interface));
    }
}

fn capacity_findings(tables: &[FlowTableHealth], findings: &mut Vec<Finding>) {
    for table in tables {
        let code = match table.status {
            CapacityStatus::Caution => FindingCode::FlowTableCaution,
            CapacityStatus::Warning => FindingCode::FlowTableWarning,
            CapacityStatus::Healthy | CapacityStatus::Unavailable => continue,
        };
        // A graded status always carries its figures.
        let (Some(usage), Some(current), Some(max)) = (table.usage_percent, table.current, table.max)
        else {
            continue;
        };
        findings.push(
            Finding::new(
                code,
                format!("datapath flow table at {}% ({} of {})", usage, current, max),
            )
            .with("datapath", table.datapath.as_deref().unwrap_or("default")),
        );
    }
}

fn structure_findings(model: &CorrelatedModel, findings: &mut Vec<Finding>) {
    for orphan in &model.topology.orphan_interfaces {
        findings.push(
            Finding::new(
                FindingCode::OrphanInterface,
                format!(
                    "interface {} is not attached to any known port",
                    orphan.interface.name
                ),
            )
            .with("declared_port", orphan.declared_port.as_deref().unwrap_or("none")),
        );
    }
    for orphan in &model.topology.orphan_ports {
        findings.push(
            Finding::new(
                FindingCode::OrphanPort,
                format!("port {} is not attached to any known bridge", orphan.port.name),
            )
            .with("declared_bridge", orphan.declared_bridge.as_deref().unwrap_or("none")),
        );
    }
    for (bridge, flows) in &model.unattached_flows {
        findings.push(
            Finding::new(
                FindingCode::UnattachedFlows,
                format!("{} flows reference bridge {} which is not in the topology", flows.len(), bridge),
            )
            .with("bridge", bridge),
        );
    }
}

/// Run every check.
pub fn analyze(
    model: &CorrelatedModel,
    config: &EngineConfig,
    matchers: &[Arc<dyn PodMatcher>],
    ctx: &LogContext,
) -> Analysis {
    let drops = classify_drops(model);
    let port_health = flagged_ports(model);
    let interface_issues = interface_issues(&model.topology);
    let flow_tables = flow_table_health(model, config);
    let coverage = coverage_rates(&model.coverage, config.observation_window_secs);
    let pods = map_pods(&model.topology, matchers);

    let mut findings = Vec::new();
    drop_findings(&drops, &mut findings);
    port_findings(&port_health, &mut findings);
    interface_findings(&interface_issues, &mut findings);
    capacity_findings(&flow_tables, &mut findings);
    structure_findings(model, &mut findings);
    sort_findings(&mut findings);

    crate::log_info!(
        ctx,
        "ANALYSIS_COMPLETE",
        active_drops = drops.active.len(),
        inactive_drops = drops.inactive.len(),
        flagged_ports = port_health.len(),
        mapped_pods = pods.mapped.len(),
        findings = findings.len(),
    );

    Analysis {
        drops,
        port_health,
        interface_issues,
        flow_tables,
        coverage,
        pods,
        findings,
    }
}
