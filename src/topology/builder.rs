//! Ownership graph construction.
//!
//! Steps, in order:
//! 1. merge records describing the same entity (UUID match, else name);
//! 2. let tunnel listings fill interface type and options gaps;
//! 3. create bridges;
//! 4. attach each port to the bridge that declares or references it;
//! 5. attach each interface to its port;
//! 6. derive port types from the attached interfaces.
//!
//! Nothing is re-keyed after placement. Anything that cannot be placed goes
//! to an orphan list with one `ConsistencyWarning`.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Diagnostic;
use crate::logging::LogContext;
use crate::model::{
    Bridge, BridgeRecord, DatapathType, FailMode, Interface, InterfaceRecord, LinkState,
    OrphanInterface, OrphanPort, Port, PortRecord, PortType, Record, SourceKind, SystemInfo,
    SystemRecord, Topology, TunnelRecord,
};

use super::merge::{Draft, Mergeable, TOPOLOGY_SOURCE};

/// Identity of a mergeable entity record.
trait Named: Mergeable {
    fn uuid(&self) -> Option<&str>;
    fn name(&self) -> &str;
}

impl Named for BridgeRecord {
    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for PortRecord {
    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for InterfaceRecord {
    fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Merge records of one entity type into drafts. Database records are
/// folded first so they always become the base.
fn fold<R: Named>(mut records: Vec<&R>, diagnostics: &mut Vec<Diagnostic>) -> Vec<Draft<R>> {
    records.sort_by_key(|r| r.source());
    let mut drafts: Vec<Draft<R>> = Vec::new();
    for record in records {
        let by_uuid = record.uuid().and_then(|u| {
            drafts
                .iter()
                .position(|d| d.record.uuid() == Some(u))
        });
        let existing = by_uuid.or_else(|| drafts.iter().position(|d| d.record.name() == record.name()));
        match existing {
            Some(idx) => drafts[idx].absorb(record, diagnostics),
            None => drafts.push(Draft::new(record.clone())),
        }
    }
    drafts
}

/// Where a placed port lives.
#[derive(Debug, Clone)]
enum PortHome {
    Bridge(String),
    Orphan(usize),
}

/// Reference index: port/interface UUID or name -> owners, in declaration order.
fn ref_index<'a>(owners: impl Iterator<Item = (&'a str, &'a [String])>) -> BTreeMap<String, Vec<String>> {
    let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (owner, refs) in owners {
        for r in refs {
            let entry = index.entry(r.clone()).or_default();
            if !entry.iter().any(|o| o == owner) {
                entry.push(owner.to_string());
            }
        }
    }
    index
}

/// Candidate owners: the explicit declaration first, then reference holders.
fn candidates(
    declared: Option<&str>,
    keys: [Option<&str>; 2],
    index: &BTreeMap<String, Vec<String>>,
    exists: impl Fn(&str) -> bool,
) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    if let Some(d) = declared {
        if exists(d) {
            found.push(d.to_string());
        }
    }
    for key in keys.into_iter().flatten() {
        for owner in index.get(key).map(Vec::as_slice).unwrap_or_default() {
            if exists(owner.as_str()) && !found.contains(owner) {
                found.push(owner.clone());
            }
        }
    }
    found
}

fn system_info(draft: Draft<SystemRecord>) -> SystemInfo {
    let r = draft.record;
    SystemInfo {
        uuid: r.uuid,
        ovs_version: r.ovs_version,
        db_version: r.db_version,
        dpdk_enabled: r.dpdk_enabled,
        datapath_types: r.datapath_types.unwrap_or_default(),
        external_ids: r.external_ids,
        other_config: r.other_config,
        sources: draft.sources,
    }
}

fn bridge_entity(draft: Draft<BridgeRecord>) -> Bridge {
    let r = draft.record;
    Bridge {
        uuid: r.uuid,
        name: r.name,
        fail_mode: r.fail_mode.unwrap_or(FailMode::Unknown),
        datapath_type: r.datapath_type.unwrap_or(DatapathType::Kernel),
        ports: BTreeMap::new(),
        external_ids: r.external_ids,
        extra: r.extra,
        sources: draft.sources,
    }
}

fn port_entity(draft: &Draft<PortRecord>) -> Port {
    let r = &draft.record;
    Port {
        uuid: r.uuid.clone(),
        name: r.name.clone(),
        port_type: PortType::Unknown,
        tag: r.tag,
        interfaces: BTreeMap::new(),
        external_ids: r.external_ids.clone(),
        extra: r.extra.clone(),
        sources: draft.sources.clone(),
    }
}

fn interface_entity(draft: Draft<InterfaceRecord>) -> Interface {
    let r = draft.record;
    Interface {
        uuid: r.uuid,
        name: r.name,
        iface_type: r.iface_type,
        link_state: r.link_state.unwrap_or(LinkState::Unknown),
        error: r.error,
        ofport: r.ofport,
        mac_in_use: r.mac_in_use,
        options: r.options,
        external_ids: r.external_ids,
        extra: r.extra,
        sources: draft.sources,
    }
}

/// The interface that types a port: the same-named one, else the first.
fn derive_port_type(port: &Port) -> PortType {
    let iface = port
        .interfaces
        .get(&port.name)
        .or_else(|| port.interfaces.values().next());
    match iface {
        // Listings omit the type of plain system interfaces.
        Some(i) => PortType::from_interface_type(Some(i.iface_type.as_deref().unwrap_or(""))),
        None => PortType::Unknown,
    }
}

/// Fill interface gaps from the datapath tunnel listing.
fn apply_tunnels(interfaces: &mut [Draft<InterfaceRecord>], tunnels: &[&TunnelRecord]) {
    for tunnel in tunnels {
        let Some(draft) = interfaces.iter_mut().find(|d| d.record.name == tunnel.port) else {
            log::debug!("TUNNEL_UNMATCHED port={} kind={}", tunnel.port, tunnel.kind);
            continue;
        };
        let iface = &mut draft.record;
        let undeclared = match iface.source {
            SourceKind::Database => iface.iface_type.is_none(),
            SourceKind::Text => iface.iface_type.as_deref().map_or(true, str::is_empty),
        };
        if undeclared {
            iface.iface_type = Some(tunnel.kind.clone());
        }
        for (key, value) in &tunnel.options {
            iface.options.entry(key.clone()).or_insert_with(|| value.clone());
        }
        draft.sources.insert(SourceKind::Text);
    }
}

/// Build the topology from every parsed record. Non-topology records are
/// ignored.
pub fn build_topology(records: &[Record], ctx: &LogContext) -> (Topology, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let mut systems = Vec::new();
    let mut bridges = Vec::new();
    let mut ports = Vec::new();
    let mut interfaces = Vec::new();
    let mut tunnels = Vec::new();
    for record in records {
        match record {
            Record::System(r) => systems.push(r),
            Record::Bridge(r) => bridges.push(r),
            Record::Port(r) => ports.push(r),
            Record::Interface(r) => interfaces.push(r),
            Record::Tunnel(r) => tunnels.push(r),
            _ => {}
        }
    }

    // 1. merge
    systems.sort_by_key(|r| r.source);
    let mut system: Option<Draft<SystemRecord>> = None;
    for record in systems {
        match system.as_mut() {
            Some(draft) => draft.absorb(record, &mut diagnostics),
            None => system = Some(Draft::new(record.clone())),
        }
    }
    let bridge_drafts = fold(bridges, &mut diagnostics);
    let port_drafts = fold(ports, &mut diagnostics);
    let mut iface_drafts = fold(interfaces, &mut diagnostics);

    // 2. tunnel listing
    apply_tunnels(&mut iface_drafts, &tunnels);

    // 3. bridges
    let port_refs = ref_index(
        bridge_drafts
            .iter()
            .map(|d| (d.record.name.as_str(), d.record.port_refs.as_slice())),
    );
    let mut topology = Topology {
        system: system.map(system_info),
        ..Topology::default()
    };
    for draft in bridge_drafts {
        let bridge = bridge_entity(draft);
        topology.bridges.insert(bridge.name.clone(), bridge);
    }

    // 4. ports
    let iface_refs = ref_index(
        port_drafts
            .iter()
            .map(|d| (d.record.name.as_str(), d.record.interface_refs.as_slice())),
    );
    let mut homes: BTreeMap<String, PortHome> = BTreeMap::new();
    for draft in &port_drafts {
        let record = &draft.record;
        let owners = candidates(
            record.bridge.as_deref(),
            [record.uuid.as_deref(), Some(record.name.as_str())],
            &port_refs,
            |b| topology.bridges.contains_key(b),
        );
        let port = port_entity(draft);
        match owners.split_first() {
            None => {
                diagnostics.push(Diagnostic::consistency(
                    TOPOLOGY_SOURCE,
                    format!(
                        "port {} has no resolvable bridge (declared: {})",
                        record.name,
                        record.bridge.as_deref().unwrap_or("none")
                    ),
                ));
                homes.insert(record.name.clone(), PortHome::Orphan(topology.orphan_ports.len()));
                topology.orphan_ports.push(OrphanPort {
                    declared_bridge: record.bridge.clone(),
                    port,
                });
            }
            Some((first, rest)) => {
                if !rest.is_empty() {
                    diagnostics.push(Diagnostic::consistency(
                        TOPOLOGY_SOURCE,
                        format!(
                            "port {} appears under bridges {}; keeping {}",
                            record.name,
                            owners.join(", "),
                            first
                        ),
                    ));
                }
                if let Some(bridge) = topology.bridges.get_mut(first) {
                    bridge.ports.insert(port.name.clone(), port);
                }
                homes.insert(record.name.clone(), PortHome::Bridge(first.clone()));
            }
        }
    }

    // 5. interfaces
    for draft in iface_drafts {
        let record = &draft.record;
        let owners = candidates(
            record.port.as_deref(),
            [record.uuid.as_deref(), Some(record.name.as_str())],
            &iface_refs,
            |p| homes.contains_key(p),
        );
        let declared_port = record.port.clone();
        let Some((first, rest)) = owners.split_first() else {
            diagnostics.push(Diagnostic::consistency(
                TOPOLOGY_SOURCE,
                format!(
                    "interface {} has no resolvable port (declared: {})",
                    record.name,
                    declared_port.as_deref().unwrap_or("none")
                ),
            ));
            topology.orphan_interfaces.push(OrphanInterface {
                declared_port,
                interface: interface_entity(draft),
            });
            continue;
        };
        if !rest.is_empty() {
            diagnostics.push(Diagnostic::consistency(
                TOPOLOGY_SOURCE,
                format!(
                    "interface {} is claimed by ports {}; keeping {}",
                    record.name,
                    owners.join(", "),
                    first
                ),
            ));
        }
        let port_name = first.clone();
        let iface = interface_entity(draft);
        let port = match homes.get(&port_name) {
            Some(PortHome::Bridge(b)) => topology
                .bridges
                .get_mut(b)
                .and_then(|bridge| bridge.ports.get_mut(&port_name)),
            Some(PortHome::Orphan(idx)) => topology.orphan_ports.get_mut(*idx).map(|o| &mut o.port),
            None => None,
        };
        if let Some(port) = port {
            port.interfaces.insert(iface.name.clone(), iface);
        }
    }

    // 6. port types
    for bridge in topology.bridges.values_mut() {
        for port in bridge.ports.values_mut() {
            port.port_type = derive_port_type(port);
        }
    }
    for orphan in &mut topology.orphan_ports {
        orphan.port.port_type = derive_port_type(&orphan.port);
    }

    let sources: BTreeSet<SourceKind> = topology
        .bridges
        .values()
        .flat_map(|b| b.sources.iter().copied())
        .collect();
    crate::log_info!(
        ctx,
        "TOPOLOGY_BUILT",
        bridges = topology.bridges.len(),
        ports = topology.port_count(),
        interfaces = topology.interface_count(),
        orphan_ports = topology.orphan_ports.len(),
        orphan_interfaces = topology.orphan_interfaces.len(),
        sources = sources.len(),
        warnings = diagnostics.len(),
    );

    (topology, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;

    fn ctx() -> LogContext {
        LogContext::new("run-test")
    }

    fn bridge(source: SourceKind, name: &str, uuid: Option<&str>, refs: &[&str]) -> Record {
        let mut r = BridgeRecord::new(source, name);
        r.uuid = uuid.map(str::to_string);
        r.port_refs = refs.iter().map(|s| s.to_string()).collect();
        Record::Bridge(r)
    }

    fn port(source: SourceKind, name: &str, uuid: Option<&str>, bridge: Option<&str>, refs: &[&str]) -> Record {
        let mut r = PortRecord::new(source, name);
        r.uuid = uuid.map(str::to_string);
        r.bridge = bridge.map(str::to_string);
        r.interface_refs = refs.iter().map(|s| s.to_string()).collect();
        Record::Port(r)
    }

    fn iface(source: SourceKind, name: &str, uuid: Option<&str>, port: Option<&str>, t: Option<&str>) -> Record {
        let mut r = InterfaceRecord::new(source, name);
        r.uuid = uuid.map(str::to_string);
        r.port = port.map(str::to_string);
        r.iface_type = t.map(str::to_string);
        Record::Interface(r)
    }

    fn db_records() -> Vec<Record> {
        vec![
            bridge(SourceKind::Database, "br-int", Some("b1"), &["p1", "p2"]),
            port(SourceKind::Database, "br-int", Some("p1"), None, &["i1"]),
            port(SourceKind::Database, "ovn-abc-0", Some("p2"), None, &["i2"]),
            iface(SourceKind::Database, "br-int", Some("i1"), None, Some("internal")),
            iface(SourceKind::Database, "ovn-abc-0", Some("i2"), None, Some("geneve")),
        ]
    }

    #[test]
    fn test_database_graph_by_uuid_refs() {
        let (topo, diags) = build_topology(&db_records(), &ctx());
        assert!(diags.is_empty(), "{:?}", diags);
        let br = topo.bridge("br-int").unwrap();
        assert_eq!(br.ports.len(), 2);
        assert_eq!(br.ports["br-int"].port_type, PortType::Internal);
        assert_eq!(br.ports["ovn-abc-0"].port_type, PortType::Tunnel("geneve".into()));
        assert_eq!(topo.interface_count(), 2);
    }

    #[test]
    fn test_text_merges_into_database_entities() {
        let mut records = db_records();
        records.push(bridge(SourceKind::Text, "br-int", None, &[]));
        records.push(port(SourceKind::Text, "ovn-abc-0", None, Some("br-int"), &[]));
        let mut text_iface = InterfaceRecord::new(SourceKind::Text, "ovn-abc-0");
        text_iface.port = Some("ovn-abc-0".into());
        text_iface.link_state = Some(LinkState::Down);
        records.push(Record::Interface(text_iface));

        let (topo, diags) = build_topology(&records, &ctx());
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(topo.bridges.len(), 1);
        let br = &topo.bridges["br-int"];
        assert_eq!(br.sources.len(), 2);
        let tun = &br.ports["ovn-abc-0"].interfaces["ovn-abc-0"];
        assert_eq!(tun.link_state, LinkState::Down);
        assert_eq!(tun.iface_type.as_deref(), Some("geneve"));
    }

    #[test]
    fn test_interface_with_missing_port_is_orphaned_once() {
        let mut records = db_records();
        records.push(iface(SourceKind::Text, "veth9", None, Some("ghost"), None));

        let (topo, diags) = build_topology(&records, &ctx());
        assert_eq!(topo.orphan_interfaces.len(), 1);
        assert_eq!(topo.orphan_interfaces[0].declared_port.as_deref(), Some("ghost"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::ConsistencyWarning);
    }

    #[test]
    fn test_port_under_two_bridges_stays_with_first() {
        let records = vec![
            bridge(SourceKind::Database, "br-a", Some("ba"), &["p1"]),
            bridge(SourceKind::Database, "br-b", Some("bb"), &["p1"]),
            port(SourceKind::Database, "shared", Some("p1"), None, &[]),
        ];
        let (topo, diags) = build_topology(&records, &ctx());
        assert!(topo.bridges["br-a"].ports.contains_key("shared"));
        assert!(topo.bridges["br-b"].ports.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("keeping br-a"));
    }

    #[test]
    fn test_port_without_bridge_is_orphaned() {
        let records = vec![port(SourceKind::Text, "lonely", None, Some("br-gone"), &[])];
        let (topo, diags) = build_topology(&records, &ctx());
        assert_eq!(topo.orphan_ports.len(), 1);
        assert_eq!(topo.orphan_ports[0].declared_bridge.as_deref(), Some("br-gone"));
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_database_system_type_survives_text_type() {
        let records = vec![
            bridge(SourceKind::Database, "br-int", Some("b1"), &["p1"]),
            port(SourceKind::Database, "veth1", Some("p1"), None, &["i1"]),
            iface(SourceKind::Database, "veth1", Some("i1"), None, Some("")),
            iface(SourceKind::Text, "veth1", None, Some("veth1"), Some("internal")),
        ];
        let (topo, diags) = build_topology(&records, &ctx());
        let port = &topo.bridges["br-int"].ports["veth1"];
        assert_eq!(port.interfaces["veth1"].iface_type.as_deref(), Some(""));
        assert_eq!(port.port_type, PortType::System);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::ConsistencyWarning);
    }

    #[test]
    fn test_tunnel_listing_fills_type_and_options() {
        let records = vec![
            bridge(SourceKind::Text, "br-int", None, &[]),
            port(SourceKind::Text, "vx0", None, Some("br-int"), &[]),
            iface(SourceKind::Text, "vx0", None, Some("vx0"), None),
            Record::Tunnel(TunnelRecord {
                bridge: Some("br-int".into()),
                port: "vx0".into(),
                kind: "vxlan".into(),
                options: [("remote_ip".to_string(), "10.1.1.1".to_string())].into_iter().collect(),
            }),
        ];
        let (topo, _) = build_topology(&records, &ctx());
        let tunnels = topo.tunnel_ports();
        assert_eq!(tunnels.len(), 1);
        assert_eq!(tunnels[0].1.kind, "vxlan");
        assert_eq!(tunnels[0].1.remote_ip.as_deref(), Some("10.1.1.1"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut records = db_records();
        records.push(iface(SourceKind::Text, "veth9", None, Some("ghost"), None));
        let (a, da) = build_topology(&records, &ctx());
        let (b, db) = build_topology(&records, &ctx());
        assert_eq!(a, b);
        assert_eq!(da, db);
    }
}
