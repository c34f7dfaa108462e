//! Port counter and interface state checks.

use serde::{Deserialize, Serialize};

use crate::correlate::CorrelatedModel;
use crate::model::{LinkState, PortStat, Topology};

/// Counters of a port with any drop or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortHealth {
    pub bridge: String,
    pub port: String,
    pub port_id: String,
    pub resolved: bool,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_drops: u64,
    pub rx_errors: u64,
    pub tx_drops: u64,
    pub tx_errors: u64,
}

impl From<&PortStat> for PortHealth {
    fn from(stat: &PortStat) -> Self {
        Self {
            bridge: stat.bridge.clone(),
            port: stat.port.clone(),
            port_id: stat.port_id.clone(),
            resolved: stat.resolved,
            rx_packets: stat.rx_packets,
            tx_packets: stat.tx_packets,
            rx_drops: stat.rx_drops,
            rx_errors: stat.rx_errors,
            tx_drops: stat.tx_drops,
            tx_errors: stat.tx_errors,
        }
    }
}

/// Ports with a non-zero drop or error counter, all four counters reported.
pub fn flagged_ports(model: &CorrelatedModel) -> Vec<PortHealth> {
    model
        .all_port_stats()
        .filter(|s| s.has_drops_or_errors())
        .map(PortHealth::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceProblem {
    Error,
    LinkDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceIssue {
    pub bridge: Option<String>,
    pub interface: String,
    pub problem: InterfaceProblem,
    pub detail: Option<String>,
}

/// Interfaces reporting an error text or a down link.
pub fn interface_issues(topology: &Topology) -> Vec<InterfaceIssue> {
    let mut issues = Vec::new();
    for (bridge, iface) in topology.all_interfaces() {
        if let Some(error) = &iface.error {
            issues.push(InterfaceIssue {
                bridge: bridge.map(str::to_string),
                interface: iface.name.clone(),
                problem: InterfaceProblem::Error,
                detail: Some(error.clone()),
            });
        }
        if iface.link_state == LinkState::Down {
            issues.push(InterfaceIssue {
                bridge: bridge.map(str::to_string),
                interface: iface.name.clone(),
                problem: InterfaceProblem::LinkDown,
                detail: None,
            });
        }
    }
    issues
}
