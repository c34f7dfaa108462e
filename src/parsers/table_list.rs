//! `ovs-vsctl list <table>` parser.
//!
//! Output is one block per row, blocks separated by blank lines, each line
//! `column<padding>: value`. Values use OVS notation (`[]` sets, `{}` maps).
//! Column-to-record mapping lives here and is shared with the snapshot
//! converter, so both sources fill records the same way.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::{
    Attributes, BridgeRecord, DatapathType, FailMode, InterfaceRecord, LinkState, PortRecord,
    Record, SourceKind, SystemRecord,
};

use super::tokenize::{parse_bool, parse_map, parse_set, split_key_value, unquote};
use super::{DumpInput, ParseOutput};

/// A column value after notation decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Scalar(String),
    Set(Vec<String>),
    Map(Attributes),
}

impl Column {
    /// Decode text notation: `[..]` set, `{..}` map, otherwise a scalar.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            Column::Set(parse_set(trimmed))
        } else if trimmed.starts_with('{') {
            Column::Map(parse_map(trimmed))
        } else {
            Column::Scalar(unquote(trimmed))
        }
    }

    /// Single value; a one-element set counts (optional columns are sets).
    pub fn scalar(&self) -> Option<String> {
        match self {
            Column::Scalar(s) if !s.is_empty() => Some(s.clone()),
            Column::Set(items) if items.len() == 1 => Some(items[0].clone()),
            _ => None,
        }
    }

    pub fn set(&self) -> Vec<String> {
        match self {
            Column::Scalar(s) if !s.is_empty() => vec![s.clone()],
            Column::Set(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn map(&self) -> Attributes {
        match self {
            Column::Map(m) => m.clone(),
            _ => Attributes::new(),
        }
    }

    /// Render back to OVS text notation for the extra-attribute bag.
    pub fn to_text(&self) -> String {
        match self {
            Column::Scalar(s) => s.clone(),
            Column::Set(items) => format!("[{}]", items.join(", ")),
            Column::Map(m) => {
                let entries: Vec<String> = m.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!("{{{}}}", entries.join(", "))
            }
        }
    }
}

pub type Columns = BTreeMap<String, Column>;

/// Build a record from one table row. Returns a reason when the row cannot
/// identify its entity.
pub fn record_from_columns(
    table: &str,
    source: SourceKind,
    columns: &Columns,
) -> std::result::Result<Record, String> {
    let get = |name: &str| columns.get(name);
    let scalar = |name: &str| get(name).and_then(Column::scalar);
    let set = |name: &str| get(name).map(Column::set).unwrap_or_default();
    let map = |name: &str| get(name).map(Column::map).unwrap_or_default();
    let extra = |known: &[&str]| -> Attributes {
        columns
            .iter()
            .filter(|(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.to_text()))
            .collect()
    };

    match table.to_ascii_lowercase().as_str() {
        "open_vswitch" => {
            let mut rec = SystemRecord::new(source);
            rec.uuid = scalar("_uuid");
            rec.ovs_version = scalar("ovs_version");
            rec.db_version = scalar("db_version");
            rec.dpdk_enabled = scalar("dpdk_initialized").and_then(|v| parse_bool(&v));
            rec.datapath_types = get("datapath_types").map(Column::set);
            rec.external_ids = map("external_ids");
            rec.other_config = map("other_config");
            rec.extra = extra(&[
                "_uuid",
                "ovs_version",
                "db_version",
                "dpdk_initialized",
                "datapath_types",
                "external_ids",
                "other_config",
            ]);
            Ok(Record::System(rec))
        }
        "bridge" => {
            let name = scalar("name").ok_or("bridge row without a name")?;
            let mut rec = BridgeRecord::new(source, &name);
            rec.uuid = scalar("_uuid");
            rec.fail_mode = scalar("fail_mode").map(|v| FailMode::parse(&v));
            rec.datapath_type = get("datapath_type").map(|c| {
                DatapathType::parse(&c.scalar().unwrap_or_default())
            });
            rec.port_refs = set("ports");
            rec.external_ids = map("external_ids");
            rec.extra = extra(&["_uuid", "name", "fail_mode", "datapath_type", "ports", "external_ids"]);
            Ok(Record::Bridge(rec))
        }
        "port" => {
            let name = scalar("name").ok_or("port row without a name")?;
            let mut rec = PortRecord::new(source, &name);
            rec.uuid = scalar("_uuid");
            rec.tag = scalar("tag").and_then(|t| t.parse().ok());
            rec.interface_refs = set("interfaces");
            rec.external_ids = map("external_ids");
            rec.extra = extra(&["_uuid", "name", "tag", "interfaces", "external_ids"]);
            Ok(Record::Port(rec))
        }
        "interface" => {
            let name = scalar("name").ok_or("interface row without a name")?;
            let mut rec = InterfaceRecord::new(source, &name);
            rec.uuid = scalar("_uuid");
            // An empty type column is meaningful: a plain system interface.
            rec.iface_type = get("type").map(|c| c.scalar().unwrap_or_default());
            rec.link_state = scalar("link_state").map(|v| LinkState::parse(&v));
            rec.error = scalar("error");
            rec.ofport = scalar("ofport").and_then(|v| v.parse().ok());
            rec.mac_in_use = scalar("mac_in_use");
            rec.options = map("options");
            rec.external_ids = map("external_ids");
            rec.extra = extra(&[
                "_uuid",
                "name",
                "type",
                "link_state",
                "error",
                "ofport",
                "mac_in_use",
                "options",
                "external_ids",
            ]);
            Ok(Record::Interface(rec))
        }
        other => Err(format!("unsupported table {}", other)),
    }
}

pub fn parse(input: &DumpInput<'_>) -> Result<ParseOutput> {
    let table = match input.kind {
        super::DumpKind::TableList(t) => t.as_str(),
        _ => "",
    };
    let mut out = ParseOutput::default();
    let mut block: Columns = Columns::new();
    let mut block_start = 0;

    for (idx, raw) in input.content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            flush_block(input.name, table, &mut block, block_start, &mut out);
            continue;
        }
        out.lines_seen += 1;
        if block.is_empty() {
            block_start = line_no;
        }
        match split_key_value(line, ':') {
            Some((key, value)) if !key.contains(char::is_whitespace) => {
                block.insert(key.to_string(), Column::from_text(value));
            }
            _ => out.reject(input.name, line_no, format!("expected `column : value`, got {:?}", line.trim())),
        }
    }
    flush_block(input.name, table, &mut block, block_start, &mut out);

    Ok(out)
}

fn flush_block(source: &str, table: &str, block: &mut Columns, start: usize, out: &mut ParseOutput) {
    if block.is_empty() {
        return;
    }
    match record_from_columns(table, SourceKind::Text, block) {
        Ok(record) => out.push(record),
        Err(reason) => out.reject(source, start, reason),
    }
    block.clear();
}
