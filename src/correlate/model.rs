use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{CapacityRecord, CoverageRecord, Flow, PortStat, Topology};

/// Flow and counter view of one bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeActivity {
    pub bridge: String,
    /// Flows grouped by OpenFlow table, in dump order within a table.
    pub tables: BTreeMap<u8, Vec<Flow>>,
    pub total_flows: usize,
    /// Flows with `packet_count > 0`.
    pub flows_with_hits: usize,
    /// Highest packet counts first; ties ordered by match expression.
    pub top_flows: Vec<Flow>,
    /// Port counters keyed by resolved port name (or raw id).
    pub port_stats: BTreeMap<String, PortStat>,
}

impl BridgeActivity {
    pub fn new(bridge: &str) -> Self {
        Self {
            bridge: bridge.to_string(),
            tables: BTreeMap::new(),
            total_flows: 0,
            flows_with_hits: 0,
            top_flows: Vec::new(),
            port_stats: BTreeMap::new(),
        }
    }

    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.tables.values().flatten()
    }
}

/// Topology plus everything attached to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorrelatedModel {
    pub topology: Topology,
    /// Only bridges with at least one flow or counter record.
    pub bridges: BTreeMap<String, BridgeActivity>,
    /// Flows for bridges absent from the topology, keyed by referenced name.
    pub unattached_flows: BTreeMap<String, Vec<Flow>>,
    pub unattached_port_stats: BTreeMap<String, Vec<PortStat>>,
    pub capacity: Vec<CapacityRecord>,
    pub coverage: Vec<CoverageRecord>,
}

impl CorrelatedModel {
    pub fn total_flows(&self) -> usize {
        self.bridges.values().map(|b| b.total_flows).sum()
    }

    pub fn all_port_stats(&self) -> impl Iterator<Item = &PortStat> {
        self.bridges
            .values()
            .flat_map(|b| b.port_stats.values())
            .chain(self.unattached_port_stats.values().flatten())
    }
}
