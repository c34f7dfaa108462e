//! Database rows to records.
//!
//! Rows arrive in OVSDB JSON notation: atoms are plain JSON values, and
//! compound values are tagged arrays (`["uuid", u]`, `["set", [..]]`,
//! `["map", [[k, v], ..]]`). They are decoded into [`Column`]s and mapped by
//! the same code as the text table listings.

use serde_json::Value;

use crate::error::{Diagnostic, DiagnosticKind};
use crate::model::{Attributes, SourceKind};
use crate::query::Row;

use super::table_list::{record_from_columns, Column, Columns};
use super::ParseOutput;

/// Tables the snapshot path reads.
pub const SNAPSHOT_TABLES: [&str; 4] = ["Open_vSwitch", "Bridge", "Port", "Interface"];

/// Render one atom as text.
pub fn atom_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) if is_tagged(items, &["uuid", "named-uuid"]) => {
            atom_to_string(&items[1])
        }
        _ => value.to_string(),
    }
}

fn is_tagged(items: &[Value], tags: &[&str]) -> bool {
    items.len() == 2 && items[0].as_str().map_or(false, |t| tags.contains(&t))
}

/// Decode one OVSDB column value.
pub fn column_from_json(value: &Value) -> Column {
    let Value::Array(items) = value else {
        return Column::Scalar(atom_to_string(value));
    };
    if is_tagged(items, &["set"]) {
        let members = items[1].as_array().map(Vec::as_slice).unwrap_or_default();
        return Column::Set(members.iter().map(atom_to_string).collect());
    }
    if is_tagged(items, &["map"]) {
        let pairs = items[1].as_array().map(Vec::as_slice).unwrap_or_default();
        let map: Attributes = pairs
            .iter()
            .filter_map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([k, v]) => Some((atom_to_string(k), atom_to_string(v))),
                _ => None,
            })
            .collect();
        return Column::Map(map);
    }
    Column::Scalar(atom_to_string(value))
}

/// Convert the rows of one table. Unusable rows become parse warnings.
pub fn records_from_rows(table: &str, rows: &[Row], source_name: &str) -> ParseOutput {
    let mut out = ParseOutput::default();
    for (idx, row) in rows.iter().enumerate() {
        out.lines_seen += 1;
        let columns: Columns = row
            .iter()
            .map(|(name, value)| (name.clone(), column_from_json(value)))
            .collect();
        match record_from_columns(table, SourceKind::Database, &columns) {
            Ok(record) => out.push(record),
            Err(reason) => {
                out.lines_rejected += 1;
                out.issues.push(Diagnostic::new(
                    DiagnosticKind::ParseWarning,
                    source_name,
                    format!("{} row {}: {}", table, idx + 1, reason),
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use serde_json::json;

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_notation() {
        assert_eq!(column_from_json(&json!("br-int")), Column::Scalar("br-int".into()));
        assert_eq!(column_from_json(&json!(7)), Column::Scalar("7".into()));
        assert_eq!(
            column_from_json(&json!(["uuid", "0a1b"])),
            Column::Scalar("0a1b".into())
        );
        assert_eq!(
            column_from_json(&json!(["set", [["uuid", "a"], ["uuid", "b"]]])),
            Column::Set(vec!["a".into(), "b".into()])
        );
        let Column::Map(map) = column_from_json(&json!(["map", [["iface-id", "default_web-0"]]]))
        else {
            panic!("expected map");
        };
        assert_eq!(map.get("iface-id").map(String::as_str), Some("default_web-0"));
    }

    #[test]
    fn test_interface_rows() {
        let rows = vec![
            row(json!({
                "_uuid": ["uuid", "6b1c"],
                "name": "veth1",
                "type": "",
                "ofport": 4,
                "link_state": "up",
                "error": ["set", []],
                "external_ids": ["map", [["iface-id", "default_web-0"]]]
            })),
            row(json!({"_uuid": ["uuid", "ffff"], "ofport": 9})),
        ];
        let out = records_from_rows("Interface", &rows, "conf.db");
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].kind, DiagnosticKind::ParseWarning);

        let Record::Interface(iface) = &out.records[0] else {
            panic!("expected interface");
        };
        assert_eq!(iface.source, SourceKind::Database);
        assert_eq!(iface.uuid.as_deref(), Some("6b1c"));
        assert_eq!(iface.ofport, Some(4));
        assert_eq!(iface.error, None);
        assert_eq!(iface.iface_type.as_deref(), Some(""));
    }

    #[test]
    fn test_bridge_port_refs() {
        let rows = vec![row(json!({
            "_uuid": ["uuid", "b1"],
            "name": "br-int",
            "fail_mode": ["set", ["secure"]],
            "ports": ["set", [["uuid", "p1"], ["uuid", "p2"]]]
        }))];
        let out = records_from_rows("Bridge", &rows, "conf.db");
        let Record::Bridge(bridge) = &out.records[0] else {
            panic!("expected bridge");
        };
        assert_eq!(bridge.port_refs, vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(bridge.fail_mode, Some(crate::model::FailMode::Secure));
    }
}
