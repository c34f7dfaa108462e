//! Database snapshot access.
//!
//! The engine never opens the snapshot itself. It asks a [`SnapshotQuery`]
//! for the rows of a table, or forwards a caller's raw transaction, and the
//! implementation decides how: by running the external `ovsdb-tool`, or by
//! reading a JSON export already on disk. No semantic interpretation happens
//! here; rows come back in OVSDB JSON notation.

pub mod ovsdb_tool;
pub mod static_snapshot;

pub use ovsdb_tool::OvsdbToolAdapter;
pub use static_snapshot::StaticSnapshot;

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::error::{DiagError, Result};

/// One table row: column name to OVSDB JSON value.
pub type Row = BTreeMap<String, Value>;

/// Query capability over one snapshot.
pub trait SnapshotQuery: Send + Sync {
    /// Human-readable origin (path or label), used as the diagnostic source.
    fn describe(&self) -> String;

    /// All rows of `table`.
    fn table(&self, table: &str) -> Result<Vec<Row>>;

    /// Run a caller-supplied transaction and return the result verbatim.
    fn raw_query(&self, transaction: &str) -> Result<Value>;
}

/// Transaction selecting every row of `table`.
pub fn select_transaction(database: &str, table: &str) -> String {
    json!([database, {"op": "select", "table": table, "where": []}]).to_string()
}

/// Extract the rows of the first operation result of a transaction reply.
///
/// Replies look like `[{"rows": [...]}]`; a failed operation carries
/// `{"error": "...", "details": "..."}` instead.
pub fn rows_from_reply(reply: &Value) -> Result<Vec<Row>> {
    let first = reply
        .as_array()
        .and_then(|ops| ops.first())
        .ok_or_else(|| DiagError::QueryError {
            reason: "reply is not a non-empty array of results".to_string(),
        })?;

    if let Some(error) = first.get("error") {
        let details = first.get("details").and_then(Value::as_str).unwrap_or("");
        return Err(DiagError::QueryError {
            reason: format!("{} {}", error.as_str().unwrap_or("error"), details)
                .trim()
                .to_string(),
        });
    }

    let rows = first
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| DiagError::QueryError {
            reason: "result has no rows".to_string(),
        })?;

    rows.iter()
        .map(|row| {
            serde_json::from_value::<Row>(row.clone()).map_err(|e| DiagError::QueryError {
                reason: format!("row is not an object: {}", e),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_transaction_shape() {
        let txn: Value = serde_json::from_str(&select_transaction("Open_vSwitch", "Bridge")).unwrap();
        assert_eq!(txn[0], "Open_vSwitch");
        assert_eq!(txn[1]["op"], "select");
        assert_eq!(txn[1]["table"], "Bridge");
    }

    #[test]
    fn test_rows_from_reply() {
        let reply = json!([{"rows": [{"name": "br-int"}, {"name": "br-ex"}]}]);
        let rows = rows_from_reply(&reply).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["name"], "br-ex");
    }

    #[test]
    fn test_error_reply_is_query_error() {
        let reply = json!([{"error": "unknown table", "details": "No table named Bogus."}]);
        let err = rows_from_reply(&reply).unwrap_err();
        assert!(matches!(err, DiagError::QueryError { .. }));
        assert!(err.to_string().contains("unknown table"));
    }
}
