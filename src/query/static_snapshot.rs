//! Snapshot already exported to JSON: `{"<Table>": [{column: value, ..}, ..]}`.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::{json, Value};

use crate::error::{DiagError, Result};

use super::{Row, SnapshotQuery};

#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    origin: String,
    tables: BTreeMap<String, Vec<Row>>,
}

impl StaticSnapshot {
    pub fn from_json_str(origin: &str, json: &str) -> Result<Self> {
        let tables: BTreeMap<String, Vec<Row>> =
            serde_json::from_str(json).map_err(|e| DiagError::SnapshotUnreadable {
                path: origin.to_string(),
                reason: format!("not a table export: {}", e),
            })?;
        Ok(Self {
            origin: origin.to_string(),
            tables,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DiagError::SourceMissing {
                source_name: origin.clone(),
            },
            _ => DiagError::SnapshotUnreadable {
                path: origin.clone(),
                reason: e.to_string(),
            },
        })?;
        Self::from_json_str(&origin, &content)
    }

    pub fn with_table(mut self, table: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(table.to_string(), rows);
        self
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl SnapshotQuery for StaticSnapshot {
    fn describe(&self) -> String {
        self.origin.clone()
    }

    fn table(&self, table: &str) -> Result<Vec<Row>> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| DiagError::QueryError {
                reason: format!("unknown table {}", table),
            })
    }

    /// Only plain `select` operations are answerable from an export; `where`
    /// clauses are ignored and every row is returned.
    fn raw_query(&self, transaction: &str) -> Result<Value> {
        let txn: Value = serde_json::from_str(transaction).map_err(|e| DiagError::QueryError {
            reason: format!("transaction is not JSON: {}", e),
        })?;
        let ops = txn
            .as_array()
            .filter(|ops| ops.len() >= 2)
            .ok_or_else(|| DiagError::QueryError {
                reason: "transaction must be [database, operation, ...]".to_string(),
            })?;

        let mut results = Vec::with_capacity(ops.len() - 1);
        for op in &ops[1..] {
            if op.get("op").and_then(Value::as_str) != Some("select") {
                return Err(DiagError::QueryError {
                    reason: "only select operations are supported on an exported snapshot"
                        .to_string(),
                });
            }
            let table = op.get("table").and_then(Value::as_str).unwrap_or_default();
            let rows = self.table(table)?;
            results.push(json!({ "rows": rows }));
        }
        Ok(Value::Array(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{rows_from_reply, select_transaction};

    const EXPORT: &str = r#"{
        "Bridge": [{"name": "br-int", "_uuid": ["uuid", "b1"]}],
        "Interface": []
    }"#;

    #[test]
    fn test_table_lookup() {
        let snap = StaticSnapshot::from_json_str("export.json", EXPORT).unwrap();
        assert_eq!(snap.table("Bridge").unwrap().len(), 1);
        assert!(snap.table("Interface").unwrap().is_empty());
        assert!(matches!(snap.table("Port"), Err(DiagError::QueryError { .. })));
    }

    #[test]
    fn test_raw_select_matches_tool_reply_shape() {
        let snap = StaticSnapshot::from_json_str("export.json", EXPORT).unwrap();
        let reply = snap
            .raw_query(&select_transaction("Open_vSwitch", "Bridge"))
            .unwrap();
        let rows = rows_from_reply(&reply).unwrap();
        assert_eq!(rows[0]["name"], "br-int");

        let err = snap
            .raw_query(r#"["Open_vSwitch", {"op": "delete", "table": "Bridge", "where": []}]"#)
            .unwrap_err();
        assert!(matches!(err, DiagError::QueryError { .. }));
    }

    #[test]
    fn test_unreadable_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            StaticSnapshot::from_path(&path),
            Err(DiagError::SnapshotUnreadable { .. })
        ));
        assert!(matches!(
            StaticSnapshot::from_path(&dir.path().join("absent.json")),
            Err(DiagError::SourceMissing { .. })
        ));
    }
}
