//! `ovs-vsctl show` parser.
//!
//! The listing nests by indentation: an optional Open_vSwitch UUID line, then
//! `Bridge <name>`, `Port <name>`, `Interface <name>` blocks whose attributes
//! are `key: value` lines indented below them. `Manager` and `Controller`
//! blocks are folded into their parent's extra attributes.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::model::{
    BridgeRecord, DatapathType, FailMode, InterfaceRecord, LinkState, PortRecord, Record,
    SourceKind, SystemRecord,
};

use super::tokenize::{non_empty, parse_map, parse_set, unquote};
use super::{numbered_lines, DumpInput, ParseOutput};

lazy_static! {
    static ref UUID_LINE: Regex =
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .unwrap();
    static ref KEYWORD_LINE: Regex = Regex::new(r"^([A-Z][A-Za-z_]*)\s+(\S.*)$").unwrap();
    static ref ATTRIBUTE_LINE: Regex = Regex::new(r"^([a-z][a-z0-9_-]*)\s*:\s*(.*)$").unwrap();
}

enum Node {
    System,
    Bridge(BridgeRecord),
    Port(PortRecord),
    Interface(InterfaceRecord),
    /// Manager, Controller, or a block this parser does not model.
    Other(String),
}

struct ShowState {
    stack: Vec<(usize, Node)>,
    system: SystemRecord,
    system_seen: bool,
}

impl ShowState {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            system: SystemRecord::new(SourceKind::Text),
            system_seen: false,
        }
    }

    /// Close every open node at or below `indent`.
    fn close_to(&mut self, indent: usize, out: &mut ParseOutput) {
        while let Some((top, _)) = self.stack.last() {
            if *top < indent {
                break;
            }
            if let Some((_, node)) = self.stack.pop() {
                emit(node, out);
            }
        }
    }

    fn nearest_bridge(&mut self) -> Option<&mut BridgeRecord> {
        self.stack.iter_mut().rev().find_map(|(_, n)| match n {
            Node::Bridge(b) => Some(b),
            _ => None,
        })
    }

    fn nearest_port(&mut self) -> Option<&mut PortRecord> {
        self.stack.iter_mut().rev().find_map(|(_, n)| match n {
            Node::Port(p) => Some(p),
            _ => None,
        })
    }
}

fn emit(node: Node, out: &mut ParseOutput) {
    match node {
        Node::Bridge(b) => out.push(Record::Bridge(b)),
        Node::Port(p) => out.push(Record::Port(p)),
        Node::Interface(i) => out.push(Record::Interface(i)),
        Node::System | Node::Other(_) => {}
    }
}

pub fn parse(input: &DumpInput<'_>) -> Result<ParseOutput> {
    let mut out = ParseOutput::default();
    let mut state = ShowState::new();

    for (line_no, line) in numbered_lines(input.content) {
        out.lines_seen += 1;
        let indent = line.len() - line.trim_start().len();
        let body = line.trim();

        if UUID_LINE.is_match(body) {
            state.close_to(indent, &mut out);
            state.system.uuid = Some(body.to_ascii_lowercase());
            state.system_seen = true;
            state.stack.push((indent, Node::System));
            continue;
        }

        if let Some(caps) = KEYWORD_LINE.captures(body) {
            let keyword = caps[1].to_string();
            let name = unquote(&caps[2]);
            state.close_to(indent, &mut out);
            open_block(&mut state, indent, &keyword, &name);
            continue;
        }

        if let Some(caps) = ATTRIBUTE_LINE.captures(body) {
            let key = caps[1].to_string();
            let value = caps[2].trim().to_string();
            apply_attribute(&mut state, indent, &key, &value);
            continue;
        }

        out.reject(input.name, line_no, format!("unrecognised line: {}", body));
    }

    state.close_to(0, &mut out);
    if state.system_seen {
        out.push(Record::System(state.system));
    }

    Ok(out)
}

fn open_block(state: &mut ShowState, indent: usize, keyword: &str, name: &str) {
    match keyword {
        "Bridge" => {
            let bridge = BridgeRecord::new(SourceKind::Text, name);
            state.stack.push((indent, Node::Bridge(bridge)));
        }
        "Port" => {
            let mut port = PortRecord::new(SourceKind::Text, name);
            if let Some(bridge) = state.nearest_bridge() {
                bridge.port_refs.push(name.to_string());
                port.bridge = Some(bridge.name.clone());
            }
            state.stack.push((indent, Node::Port(port)));
        }
        "Interface" => {
            let mut iface = InterfaceRecord::new(SourceKind::Text, name);
            if let Some(port) = state.nearest_port() {
                port.interface_refs.push(name.to_string());
                iface.port = Some(port.name.clone());
            }
            state.stack.push((indent, Node::Interface(iface)));
        }
        other => {
            let key = other.to_ascii_lowercase();
            insert_into_owner(state, indent, &key, name);
            state.stack.push((indent, Node::Other(key)));
        }
    }
}

/// Owner of a line at `indent`: the innermost open node indented less.
fn owner_index(state: &ShowState, indent: usize) -> Option<usize> {
    state.stack.iter().rposition(|(i, _)| *i < indent)
}

fn insert_into_owner(state: &mut ShowState, indent: usize, key: &str, value: &str) {
    let Some(idx) = owner_index(state, indent) else {
        state.system.extra.insert(key.to_string(), value.to_string());
        state.system_seen = true;
        return;
    };

    if let Node::Other(parent) = &state.stack[idx].1 {
        let nested = format!("{}.{}", parent, key);
        let parent_indent = state.stack[idx].0;
        insert_into_owner(state, parent_indent, &nested, value);
        return;
    }

    match &mut state.stack[idx].1 {
        Node::Bridge(b) => {
            b.extra.insert(key.to_string(), value.to_string());
        }
        Node::Port(p) => {
            p.extra.insert(key.to_string(), value.to_string());
        }
        Node::Interface(i) => {
            i.extra.insert(key.to_string(), value.to_string());
        }
        Node::System => {
            state.system.extra.insert(key.to_string(), value.to_string());
        }
        Node::Other(_) => {}
    }
}

fn apply_attribute(state: &mut ShowState, indent: usize, key: &str, value: &str) {
    let Some(idx) = owner_index(state, indent) else {
        apply_system_attribute(state, key, value);
        return;
    };

    match &state.stack[idx].1 {
        Node::System => {
            apply_system_attribute(state, key, value);
            return;
        }
        Node::Other(block) => {
            let nested = format!("{}.{}", block, key);
            let block_indent = state.stack[idx].0;
            insert_into_owner(state, block_indent, &nested, &unquote(value));
            return;
        }
        _ => {}
    }

    match &mut state.stack[idx].1 {
        Node::Bridge(b) => match key {
            "fail_mode" => b.fail_mode = non_empty(value).map(|v| FailMode::parse(&v)),
            "datapath_type" => b.datapath_type = Some(DatapathType::parse(&unquote(value))),
            _ => {
                b.extra.insert(key.to_string(), unquote(value));
            }
        },
        Node::Port(p) => match key {
            "tag" => match value.trim().parse() {
                Ok(tag) => p.tag = Some(tag),
                Err(_) => {
                    p.extra.insert(key.to_string(), unquote(value));
                }
            },
            _ => {
                p.extra.insert(key.to_string(), unquote(value));
            }
        },
        Node::Interface(i) => match key {
            "type" => i.iface_type = Some(unquote(value)),
            "error" => i.error = non_empty(value),
            "options" => i.options = parse_map(value),
            "external_ids" => i.external_ids = parse_map(value),
            "link_state" => i.link_state = Some(LinkState::parse(&unquote(value))),
            _ => {
                i.extra.insert(key.to_string(), unquote(value));
            }
        },
        Node::System | Node::Other(_) => {}
    }
}

fn apply_system_attribute(state: &mut ShowState, key: &str, value: &str) {
    state.system_seen = true;
    match key {
        "ovs_version" => state.system.ovs_version = non_empty(value),
        "db_version" => state.system.db_version = non_empty(value),
        "datapath_types" => state.system.datapath_types = Some(parse_set(value)),
        _ => {
            state.system.extra.insert(key.to_string(), unquote(value));
        }
    }
}
