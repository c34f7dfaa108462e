//! Parsed records.
//!
//! Every parser, text or database, emits these types. Fields are optional
//! because any one source may omit them; the topology builder decides which
//! source wins. Unknown fields land in `extra` instead of being dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Open-ended attribute bag (external ids, options, unknown fields).
pub type Attributes = BTreeMap<String, String>;

/// Which view of the switch a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Committed configuration from the database snapshot.
    Database,
    /// Captured command output.
    Text,
}

/// Bridge fail mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    Standalone,
    Secure,
    Unknown,
}

impl FailMode {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "standalone" => FailMode::Standalone,
            "secure" => FailMode::Secure,
            _ => FailMode::Unknown,
        }
    }
}

/// Packet-forwarding implementation behind a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatapathType {
    Kernel,
    Userspace,
    Unknown,
}

impl DatapathType {
    /// An empty datapath type is the OVS default, the kernel datapath.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "system" => DatapathType::Kernel,
            "netdev" => DatapathType::Userspace,
            _ => DatapathType::Unknown,
        }
    }
}

/// Interface administrative/operational link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    Down,
    Unknown,
}

impl LinkState {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => LinkState::Up,
            "down" => LinkState::Down,
            _ => LinkState::Unknown,
        }
    }
}

/// Interface types that implement an overlay encapsulation.
pub const TUNNEL_KINDS: &[&str] = &[
    "geneve", "vxlan", "gre", "stt", "erspan", "ip6erspan", "ip6gre", "lisp", "gtpu", "bareudp",
    "srv6",
];

pub fn is_tunnel_kind(iface_type: &str) -> bool {
    TUNNEL_KINDS.contains(&iface_type.trim().to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub source: SourceKind,
    pub uuid: Option<String>,
    pub ovs_version: Option<String>,
    pub db_version: Option<String>,
    pub dpdk_enabled: Option<bool>,
    pub datapath_types: Option<Vec<String>>,
    pub external_ids: Attributes,
    pub other_config: Attributes,
    pub extra: Attributes,
}

impl SystemRecord {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            uuid: None,
            ovs_version: None,
            db_version: None,
            dpdk_enabled: None,
            datapath_types: None,
            external_ids: Attributes::new(),
            other_config: Attributes::new(),
            extra: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRecord {
    pub source: SourceKind,
    pub uuid: Option<String>,
    pub name: String,
    pub fail_mode: Option<FailMode>,
    pub datapath_type: Option<DatapathType>,
    /// Ports this bridge claims, by UUID or name.
    pub port_refs: Vec<String>,
    pub external_ids: Attributes,
    pub extra: Attributes,
}

impl BridgeRecord {
    pub fn new(source: SourceKind, name: &str) -> Self {
        Self {
            source,
            uuid: None,
            name: name.to_string(),
            fail_mode: None,
            datapath_type: None,
            port_refs: Vec::new(),
            external_ids: Attributes::new(),
            extra: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub source: SourceKind,
    pub uuid: Option<String>,
    pub name: String,
    /// Owning bridge name, when the source states it directly.
    pub bridge: Option<String>,
    pub tag: Option<u16>,
    /// Interfaces this port claims, by UUID or name.
    pub interface_refs: Vec<String>,
    pub external_ids: Attributes,
    pub extra: Attributes,
}

impl PortRecord {
    pub fn new(source: SourceKind, name: &str) -> Self {
        Self {
            source,
            uuid: None,
            name: name.to_string(),
            bridge: None,
            tag: None,
            interface_refs: Vec::new(),
            external_ids: Attributes::new(),
            extra: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub source: SourceKind,
    pub uuid: Option<String>,
    pub name: String,
    /// Owning port name, when the source states it directly.
    pub port: Option<String>,
    pub iface_type: Option<String>,
    pub link_state: Option<LinkState>,
    pub error: Option<String>,
    pub ofport: Option<i64>,
    pub mac_in_use: Option<String>,
    pub options: Attributes,
    pub external_ids: Attributes,
    pub extra: Attributes,
}

impl InterfaceRecord {
    pub fn new(source: SourceKind, name: &str) -> Self {
        Self {
            source,
            uuid: None,
            name: name.to_string(),
            port: None,
            iface_type: None,
            link_state: None,
            error: None,
            ofport: None,
            mac_in_use: None,
            options: Attributes::new(),
            external_ids: Attributes::new(),
            extra: Attributes::new(),
        }
    }
}

/// One OpenFlow rule from a flow dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub bridge: Option<String>,
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

/// Per-port counters from a port statistics dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStatRecord {
    pub bridge: Option<String>,
    /// Port number, `LOCAL`, or name, as printed.
    pub port: String,
    pub rx_packets: u64,
    pub rx_drops: u64,
    pub rx_errors: u64,
    pub tx_packets: u64,
    pub tx_drops: u64,
    pub tx_errors: u64,
    pub extra: Attributes,
}

/// A tunnel port as seen by the datapath listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelRecord {
    pub bridge: Option<String>,
    pub port: String,
    pub kind: String,
    pub options: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub name: String,
    pub total: u64,
    /// Observation window declared by the dump, if any.
    pub window_secs: Option<f64>,
    pub extra: Attributes,
}

/// Flow capacity report for one datapath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityRecord {
    pub datapath: Option<String>,
    pub current: Option<u64>,
    /// Configured maximum (flow limit).
    pub max: Option<u64>,
    pub average: Option<u64>,
    /// High-water mark.
    pub peak: Option<u64>,
}

/// Any record a parser can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    System(SystemRecord),
    Bridge(BridgeRecord),
    Port(PortRecord),
    Interface(InterfaceRecord),
    Flow(FlowRecord),
    PortStat(PortStatRecord),
    Tunnel(TunnelRecord),
    Coverage(CoverageRecord),
    Capacity(CapacityRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_parsing() {
        assert_eq!(FailMode::parse("secure"), FailMode::Secure);
        assert_eq!(FailMode::parse("bogus"), FailMode::Unknown);
        assert_eq!(DatapathType::parse(""), DatapathType::Kernel);
        assert_eq!(DatapathType::parse("netdev"), DatapathType::Userspace);
        assert_eq!(LinkState::parse("UP"), LinkState::Up);
    }

    #[test]
    fn test_tunnel_kinds() {
        assert!(is_tunnel_kind("geneve"));
        assert!(is_tunnel_kind("VXLAN"));
        assert!(!is_tunnel_kind("internal"));
        assert!(!is_tunnel_kind(""));
    }
}
