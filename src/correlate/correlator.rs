use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::thread;

use crate::config::EngineConfig;
use crate::error::Diagnostic;
use crate::logging::LogContext;
use crate::model::{Bridge, Flow, FlowRecord, PortStat, PortStatRecord, Record, Topology};

use super::model::{BridgeActivity, CorrelatedModel};

/// Bucket key for records that carry no bridge at all.
const UNKNOWN_BRIDGE: &str = "unknown";

/// OpenFlow number of a bridge's own internal port.
const OFPP_LOCAL: i64 = 65534;

fn compare_hits(a: &Flow, b: &Flow) -> Ordering {
    b.packet_count
        .cmp(&a.packet_count)
        .then_with(|| a.match_expr.cmp(&b.match_expr))
        .then_with(|| a.table.cmp(&b.table))
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| a.actions.cmp(&b.actions))
}

/// Top `n` flows by packet count, ties broken by match expression.
pub fn rank_top_flows<'a>(flows: impl IntoIterator<Item = &'a Flow>, n: usize) -> Vec<Flow> {
    let mut ranked: Vec<&Flow> = flows.into_iter().collect();
    ranked.sort_by(|a, b| compare_hits(a, b));
    ranked.into_iter().take(n).cloned().collect()
}

/// Resolve a port id printed by a statistics dump to a port name.
///
/// Numeric ids go through interface `ofport`, `LOCAL` is the bridge's own
/// internal port, and a name is accepted if the bridge has that port.
pub fn resolve_port_id(bridge: &Bridge, id: &str) -> Option<String> {
    if id.eq_ignore_ascii_case("LOCAL") {
        return bridge
            .ports
            .get(&bridge.name)
            .or_else(|| bridge.port_by_ofport(OFPP_LOCAL))
            .map(|p| p.name.clone());
    }
    if let Ok(number) = id.parse::<i64>() {
        return bridge.port_by_ofport(number).map(|p| p.name.clone());
    }
    bridge.ports.get(id).map(|p| p.name.clone())
}

/// Per-bridge inputs collected before aggregation.
#[derive(Default)]
struct BridgeInputs {
    flows: Vec<FlowRecord>,
    port_stats: Vec<PortStatRecord>,
}

fn aggregate(bridge: &Bridge, inputs: BridgeInputs, top_n: usize) -> BridgeActivity {
    let mut activity = BridgeActivity::new(&bridge.name);

    for record in inputs.flows {
        let flow = Flow::from_record(&bridge.name, record);
        activity.total_flows += 1;
        if flow.packet_count > 0 {
            activity.flows_with_hits += 1;
        }
        activity.tables.entry(flow.table).or_default().push(flow);
    }
    activity.top_flows = rank_top_flows(activity.flows(), top_n);

    for record in inputs.port_stats {
        let (name, resolved) = match resolve_port_id(bridge, &record.port) {
            Some(name) => (name, true),
            None => (record.port.clone(), false),
        };
        let stat = PortStat::from_record(&bridge.name, &name, resolved, record);
        activity.port_stats.entry(name).or_insert(stat);
    }

    activity
}

/// Result of one bridge worker. A panicked worker loses only its own bridge,
/// and the loss is reported.
fn settle(
    bridge: &str,
    joined: thread::Result<BridgeActivity>,
    diagnostics: &mut Vec<Diagnostic>,
    ctx: &LogContext,
) -> Option<BridgeActivity> {
    match joined {
        Ok(activity) => Some(activity),
        Err(_) => {
            crate::log_warn!(ctx, "BRIDGE_AGGREGATION_ABORTED", bridge = bridge);
            diagnostics.push(Diagnostic::consistency(
                "correlator",
                format!("aggregation aborted for bridge {}; its flows and counters are not reported", bridge),
            ));
            None
        }
    }
}

/// Attach flows and counters to the topology.
pub fn correlate(
    topology: Topology,
    records: &[Record],
    config: &EngineConfig,
    ctx: &LogContext,
) -> (CorrelatedModel, Vec<Diagnostic>) {
    let mut inputs: BTreeMap<String, BridgeInputs> = BTreeMap::new();
    let mut model = CorrelatedModel::default();

    for record in records {
        match record {
            Record::Flow(flow) => {
                let bridge = flow.bridge.as_deref().unwrap_or(UNKNOWN_BRIDGE);
                if topology.bridges.contains_key(bridge) {
                    inputs.entry(bridge.to_string()).or_default().flows.push(flow.clone());
                } else {
                    model
                        .unattached_flows
                        .entry(bridge.to_string())
                        .or_default()
                        .push(Flow::from_record(bridge, flow.clone()));
                }
            }
            Record::PortStat(stat) => {
                let bridge = stat.bridge.as_deref().unwrap_or(UNKNOWN_BRIDGE);
                if topology.bridges.contains_key(bridge) {
                    inputs.entry(bridge.to_string()).or_default().port_stats.push(stat.clone());
                } else {
                    let port = stat.port.clone();
                    model
                        .unattached_port_stats
                        .entry(bridge.to_string())
                        .or_default()
                        .push(PortStat::from_record(bridge, &port, false, stat.clone()));
                }
            }
            Record::Capacity(c) => model.capacity.push(c.clone()),
            Record::Coverage(c) => model.coverage.push(c.clone()),
            _ => {}
        }
    }

    let work: Vec<(&Bridge, BridgeInputs)> = inputs
        .into_iter()
        .filter_map(|(name, input)| topology.bridges.get(&name).map(|b| (b, input)))
        .collect();

    let mut diagnostics = Vec::new();
    let activities: Vec<BridgeActivity> = if config.parallel && work.len() > 1 {
        thread::scope(|scope| {
            let handles: Vec<_> = work
                .into_iter()
                .map(|(bridge, input)| {
                    (bridge, scope.spawn(move || aggregate(bridge, input, config.top_n)))
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|(bridge, h)| settle(&bridge.name, h.join(), &mut diagnostics, ctx))
                .collect()
        })
    } else {
        work.into_iter()
            .map(|(bridge, input)| aggregate(bridge, input, config.top_n))
            .collect()
    };
    for activity in activities {
        model.bridges.insert(activity.bridge.clone(), activity);
    }

    for (bridge, flows) in &model.unattached_flows {
        diagnostics.push(Diagnostic::consistency(
            "correlator",
            format!("{} flows reference unknown bridge {}", flows.len(), bridge),
        ));
    }
    for (bridge, stats) in &model.unattached_port_stats {
        diagnostics.push(Diagnostic::consistency(
            "correlator",
            format!("{} port counters reference unknown bridge {}", stats.len(), bridge),
        ));
    }

    crate::log_info!(
        ctx,
        "CORRELATION_COMPLETE",
        bridges = model.bridges.len(),
        flows = model.total_flows(),
        unattached_bridges = model.unattached_flows.len(),
    );

    model.topology = topology;
    (model, diagnostics)
}
