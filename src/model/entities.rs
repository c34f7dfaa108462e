//! Linked switch model.
//!
//! Built once per run by the topology builder and flow correlator. Ordered
//! maps keep every traversal deterministic, so two builds over the same
//! records compare equal.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::records::{
    is_tunnel_kind, Attributes, DatapathType, FailMode, FlowRecord, LinkState, PortStatRecord,
    SourceKind,
};

/// Host-level switch information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub uuid: Option<String>,
    pub ovs_version: Option<String>,
    pub db_version: Option<String>,
    pub dpdk_enabled: Option<bool>,
    pub datapath_types: Vec<String>,
    pub external_ids: Attributes,
    pub other_config: Attributes,
    pub sources: BTreeSet<SourceKind>,
}

impl SystemInfo {
    pub fn hostname(&self) -> Option<&str> {
        self.external_ids.get("hostname").map(String::as_str)
    }

    pub fn encap_type(&self) -> Option<&str> {
        self.external_ids.get("ovn-encap-type").map(String::as_str)
    }

    pub fn encap_ip(&self) -> Option<&str> {
        self.external_ids.get("ovn-encap-ip").map(String::as_str)
    }

    /// Configured datapath flow limit (`other_config:flow-limit`).
    pub fn flow_limit(&self) -> Option<u64> {
        self.other_config
            .get("flow-limit")
            .and_then(|v| v.trim().parse().ok())
    }
}

/// Port classification, derived from the backing interface type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Internal,
    Patch,
    /// Overlay port; carries the encapsulation kind (geneve, vxlan, ...).
    Tunnel(String),
    System,
    Unknown,
}

impl PortType {
    pub fn from_interface_type(iface_type: Option<&str>) -> Self {
        let Some(raw) = iface_type else {
            return PortType::Unknown;
        };
        let lowered = raw.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "" | "system" => PortType::System,
            "internal" => PortType::Internal,
            "patch" => PortType::Patch,
            t if t.starts_with("dpdk") || t == "afxdp" || t == "tap" => PortType::System,
            t if is_tunnel_kind(t) => PortType::Tunnel(lowered.clone()),
            _ => PortType::Unknown,
        }
    }

    pub fn is_tunnel(&self) -> bool {
        matches!(self, PortType::Tunnel(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bridge {
    pub uuid: Option<String>,
    pub name: String,
    pub fail_mode: FailMode,
    pub datapath_type: DatapathType,
    pub ports: BTreeMap<String, Port>,
    pub external_ids: Attributes,
    pub extra: Attributes,
    pub sources: BTreeSet<SourceKind>,
}

impl Bridge {
    pub fn interfaces(&self) -> impl Iterator<Item = (&Port, &Interface)> {
        self.ports
            .values()
            .flat_map(|p| p.interfaces.values().map(move |i| (p, i)))
    }

    /// Port whose interface has the given OpenFlow port number.
    pub fn port_by_ofport(&self, ofport: i64) -> Option<&Port> {
        self.ports
            .values()
            .find(|p| p.interfaces.values().any(|i| i.ofport == Some(ofport)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub uuid: Option<String>,
    pub name: String,
    pub port_type: PortType,
    pub tag: Option<u16>,
    pub interfaces: BTreeMap<String, Interface>,
    pub external_ids: Attributes,
    pub extra: Attributes,
    pub sources: BTreeSet<SourceKind>,
}

impl Port {
    /// Tunnel view of this port, if it is tunnel-typed.
    pub fn tunnel(&self) -> Option<TunnelPort> {
        let PortType::Tunnel(kind) = &self.port_type else {
            return None;
        };
        let iface = self
            .interfaces
            .values()
            .find(|i| i.iface_type.as_deref().map(is_tunnel_kind).unwrap_or(false))
            .or_else(|| self.interfaces.values().next())?;
        let opt = |key: &str| iface.options.get(key).cloned();
        Some(TunnelPort {
            port: self.name.clone(),
            interface: iface.name.clone(),
            kind: kind.clone(),
            remote_ip: opt("remote_ip"),
            local_ip: opt("local_ip"),
            key: opt("key"),
            dst_port: opt("dst_port").and_then(|p| p.parse().ok()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub uuid: Option<String>,
    pub name: String,
    pub iface_type: Option<String>,
    pub link_state: LinkState,
    pub error: Option<String>,
    pub ofport: Option<i64>,
    pub mac_in_use: Option<String>,
    pub options: Attributes,
    pub external_ids: Attributes,
    pub extra: Attributes,
    pub sources: BTreeSet<SourceKind>,
}

/// Tunnel-specific view of a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelPort {
    pub port: String,
    pub interface: String,
    pub kind: String,
    pub remote_ip: Option<String>,
    pub local_ip: Option<String>,
    pub key: Option<String>,
    pub dst_port: Option<u16>,
}

/// Interface whose declared port could not be found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanInterface {
    pub declared_port: Option<String>,
    pub interface: Interface,
}

/// Port whose owning bridge could not be found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanPort {
    pub declared_bridge: Option<String>,
    pub port: Port,
}

/// Ownership graph: System -> Bridge -> Port -> Interface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Topology {
    pub system: Option<SystemInfo>,
    /// Bridges by name.
    pub bridges: BTreeMap<String, Bridge>,
    pub orphan_ports: Vec<OrphanPort>,
    pub orphan_interfaces: Vec<OrphanInterface>,
}

impl Topology {
    pub fn bridge(&self, name: &str) -> Option<&Bridge> {
        self.bridges.get(name)
    }

    pub fn port_count(&self) -> usize {
        self.bridges.values().map(|b| b.ports.len()).sum()
    }

    pub fn interface_count(&self) -> usize {
        self.bridges
            .values()
            .flat_map(|b| b.ports.values())
            .map(|p| p.interfaces.len())
            .sum()
    }

    /// Every interface in the graph with its bridge, including interfaces of
    /// orphan ports and orphan interfaces (bridge `None`).
    pub fn all_interfaces(&self) -> Vec<(Option<&str>, &Interface)> {
        let mut out: Vec<(Option<&str>, &Interface)> = self
            .bridges
            .values()
            .flat_map(|b| b.interfaces().map(move |(_, i)| (Some(b.name.as_str()), i)))
            .collect();
        out.extend(
            self.orphan_ports
                .iter()
                .flat_map(|o| o.port.interfaces.values().map(|i| (None, i))),
        );
        out.extend(self.orphan_interfaces.iter().map(|o| (None, &o.interface)));
        out
    }

    /// Tunnel views of all tunnel-typed ports, keyed by bridge.
    pub fn tunnel_ports(&self) -> Vec<(String, TunnelPort)> {
        self.bridges
            .values()
            .flat_map(|b| {
                b.ports
                    .values()
                    .filter_map(move |p| p.tunnel().map(|t| (b.name.clone(), t)))
            })
            .collect()
    }
}

/// A flow attached to a bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub bridge: String,
    pub table: u8,
    pub priority: u16,
    pub match_expr: String,
    pub actions: String,
    pub packet_count: u64,
    pub byte_count: u64,
    pub cookie: Option<String>,
    pub duration_secs: Option<f64>,
    pub extra: Attributes,
}

impl Flow {
    pub fn from_record(bridge: &str, record: FlowRecord) -> Self {
        Self {
            bridge: bridge.to_string(),
            table: record.table,
            priority: record.priority,
            match_expr: record.match_expr,
            actions: record.actions,
            packet_count: record.packet_count,
            byte_count: record.byte_count,
            cookie: record.cookie,
            duration_secs: record.duration_secs,
            extra: record.extra,
        }
    }
}

/// Port counters attached to a (bridge, port) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStat {
    pub bridge: String,
    /// Resolved port name, or the raw id when it could not be resolved.
    pub port: String,
    /// Identifier exactly as printed in the dump.
    pub port_id: String,
    pub resolved: bool,
    pub rx_packets: u64,
    pub rx_drops: u64,
    pub rx_errors: u64,
    pub tx_packets: u64,
    pub tx_drops: u64,
    pub tx_errors: u64,
    pub extra: Attributes,
}

impl PortStat {
    pub fn from_record(bridge: &str, port: &str, resolved: bool, record: PortStatRecord) -> Self {
        Self {
            bridge: bridge.to_string(),
            port: port.to_string(),
            port_id: record.port,
            resolved,
            rx_packets: record.rx_packets,
            rx_drops: record.rx_drops,
            rx_errors: record.rx_errors,
            tx_packets: record.tx_packets,
            tx_drops: record.tx_drops,
            tx_errors: record.tx_errors,
            extra: record.extra,
        }
    }

    pub fn has_drops_or_errors(&self) -> bool {
        self.rx_drops > 0 || self.rx_errors > 0 || self.tx_drops > 0 || self.tx_errors > 0
    }
}
