//! `ovs-appctl dpif/show` parser. Only tunnel ports produce records; the
//! other port lines are recognised and skipped.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::model::{is_tunnel_kind, Record, TunnelRecord};

use super::tokenize::{parse_map, split_key_value};
use super::{numbered_lines, DumpInput, ParseOutput};

lazy_static! {
    static ref DATAPATH_LINE: Regex = Regex::new(r"^\S+@\S+:").unwrap();
    static ref BRIDGE_LINE: Regex = Regex::new(r"^(\S+):$").unwrap();
    static ref PORT_LINE: Regex =
        Regex::new(r"^(\S+)\s+(\S+)/(\S+):\s*(?:\((.*)\))?$").unwrap();
}

pub fn parse(input: &DumpInput<'_>) -> Result<ParseOutput> {
    let mut out = ParseOutput::default();
    let mut bridge: Option<String> = None;

    for (line_no, line) in numbered_lines(input.content) {
        let trimmed = line.trim();
        out.lines_seen += 1;

        if DATAPATH_LINE.is_match(trimmed) {
            bridge = None;
            continue;
        }
        if let Some(caps) = BRIDGE_LINE.captures(trimmed) {
            bridge = Some(caps[1].to_string());
            continue;
        }
        let Some(caps) = PORT_LINE.captures(trimmed) else {
            out.reject(input.name, line_no, format!("unrecognised datapath line {:?}", trimmed));
            continue;
        };

        let description = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
        let (kind, options) = match split_key_value(description, ':') {
            Some((kind, opts)) => (kind, parse_map(opts)),
            None => (description.trim(), Default::default()),
        };
        if !is_tunnel_kind(kind) {
            continue;
        }
        out.push(Record::Tunnel(TunnelRecord {
            bridge: bridge.clone(),
            port: caps[1].to_string(),
            kind: kind.to_string(),
            options,
        }));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::DumpKind;

    const DUMP: &str = "system@ovs-system: hit:51234 missed:873
  br-ex:
    br-ex 65534/3: (internal)
    eth1 1/4: (system)
  br-int:
    br-int 65534/1: (internal)
    ovn-abc-0 3/2: (geneve: csum=true, key=flow, remote_ip=10.0.0.2)
    vxlan0 4/6: (vxlan: dst_port=4789, remote_ip=flow)
    patch-br-int-to-br-ex 5/none: (patch: peer=patch-br-ex-to-br-int)
";

    fn run(content: &str) -> ParseOutput {
        let kind = DumpKind::Tunnels;
        parse(&DumpInput {
            name: "ovs-appctl_dpif.show",
            kind: &kind,
            content,
        })
        .unwrap()
    }

    #[test]
    fn test_only_tunnels_are_emitted() {
        let out = run(DUMP);
        assert!(out.issues.is_empty(), "{:?}", out.issues);
        assert_eq!(out.records.len(), 2);

        let Record::Tunnel(geneve) = &out.records[0] else {
            panic!("expected tunnel");
        };
        assert_eq!(geneve.bridge.as_deref(), Some("br-int"));
        assert_eq!(geneve.port, "ovn-abc-0");
        assert_eq!(geneve.kind, "geneve");
        assert_eq!(geneve.options.get("remote_ip").map(String::as_str), Some("10.0.0.2"));

        let Record::Tunnel(vxlan) = &out.records[1] else {
            panic!("expected tunnel");
        };
        assert_eq!(vxlan.options.get("dst_port").map(String::as_str), Some("4789"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let out = run("no datapath here\n");
        assert!(out.is_unrecognised());
    }
}
