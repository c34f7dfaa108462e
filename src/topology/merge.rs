//! Dual-source record merging.
//!
//! Precedence is one rule: a database value beats a text value; between two
//! records of the same source the first one seen wins. A field present on
//! only one side is taken as-is. Every disagreement on a set value becomes a
//! `ConsistencyWarning` naming the entity, the field and both values.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::Diagnostic;
use crate::model::{
    Attributes, BridgeRecord, InterfaceRecord, PortRecord, SourceKind, SystemRecord,
};

/// Diagnostic source for everything the builder reports.
pub const TOPOLOGY_SOURCE: &str = "topology";

/// Field-level merge of two records describing the same entity.
pub trait Mergeable: Clone {
    fn source(&self) -> SourceKind;

    /// `bridge br-int`, `interface veth1`, ...
    fn label(&self) -> String;

    /// Fill gaps in `self` from `other`, reporting conflicts to `scope`.
    fn absorb(&mut self, other: &Self, scope: &mut MergeScope<'_>);
}

/// Conflict reporting context for one merge.
pub struct MergeScope<'a> {
    entity: String,
    kept: SourceKind,
    other: SourceKind,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> MergeScope<'a> {
    fn new(
        entity: String,
        kept: SourceKind,
        other: SourceKind,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            entity,
            kept,
            other,
            diagnostics,
        }
    }

    fn conflict(&mut self, field: &str, kept: &dyn fmt::Debug, other: &dyn fmt::Debug) {
        let message = format!(
            "{}: {} differs ({}={:?}, {}={:?}); keeping {} value",
            self.entity,
            field,
            source_label(self.kept),
            kept,
            source_label(self.other),
            other,
            source_label(self.kept),
        );
        log::debug!("MERGE_CONFLICT entity={} field={}", self.entity, field);
        self.diagnostics
            .push(Diagnostic::consistency(TOPOLOGY_SOURCE, message));
    }

    /// Scalar field: keep ours, fill from theirs, report disagreement.
    pub fn field<T>(&mut self, name: &str, ours: &mut Option<T>, theirs: &Option<T>)
    where
        T: Clone + PartialEq + fmt::Debug,
    {
        let Some(value) = theirs else {
            return;
        };
        if let Some(kept) = ours.as_ref() {
            if kept != value {
                self.conflict(name, kept, value);
            }
        } else {
            *ours = Some(value.clone());
        }
    }

    /// Map field: per key, same rule as [`MergeScope::field`].
    pub fn map(&mut self, name: &str, ours: &mut Attributes, theirs: &Attributes) {
        for (key, value) in theirs {
            match ours.get(key) {
                None => {
                    ours.insert(key.clone(), value.clone());
                }
                Some(kept) if kept != value => {
                    let kept = kept.clone();
                    self.conflict(&format!("{}:{}", name, key), &kept, value);
                }
                Some(_) => {}
            }
        }
    }

    /// Unknown-attribute bag: fill gaps without reporting.
    pub fn extra(&mut self, ours: &mut Attributes, theirs: &Attributes) {
        for (key, value) in theirs {
            ours.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Reference list: union, order of first appearance.
    pub fn refs(&mut self, ours: &mut Vec<String>, theirs: &[String]) {
        for r in theirs {
            if !ours.contains(r) {
                ours.push(r.clone());
            }
        }
    }
}

pub fn source_label(source: SourceKind) -> &'static str {
    match source {
        SourceKind::Database => "database",
        SourceKind::Text => "text",
    }
}

/// Merge `incoming` into `base`, database taking precedence over text.
pub fn merge_records<R: Mergeable>(base: &mut R, incoming: &R, diagnostics: &mut Vec<Diagnostic>) {
    if incoming.source() == SourceKind::Database && base.source() != SourceKind::Database {
        let previous = std::mem::replace(base, incoming.clone());
        merge_records(base, &previous, diagnostics);
        return;
    }
    let mut scope = MergeScope::new(base.label(), base.source(), incoming.source(), diagnostics);
    base.absorb(incoming, &mut scope);
}

/// A merged record plus every source that contributed to it.
#[derive(Debug, Clone)]
pub struct Draft<R> {
    pub record: R,
    pub sources: BTreeSet<SourceKind>,
}

impl<R: Mergeable> Draft<R> {
    pub fn new(record: R) -> Self {
        let sources = BTreeSet::from([record.source()]);
        Self { record, sources }
    }

    pub fn absorb(&mut self, incoming: &R, diagnostics: &mut Vec<Diagnostic>) {
        self.sources.insert(incoming.source());
        merge_records(&mut self.record, incoming, diagnostics);
    }
}

impl Mergeable for SystemRecord {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn label(&self) -> String {
        "system".to_string()
    }

    fn absorb(&mut self, other: &Self, scope: &mut MergeScope<'_>) {
        scope.field("uuid", &mut self.uuid, &other.uuid);
        scope.field("ovs_version", &mut self.ovs_version, &other.ovs_version);
        scope.field("db_version", &mut self.db_version, &other.db_version);
        scope.field("dpdk_enabled", &mut self.dpdk_enabled, &other.dpdk_enabled);
        scope.field("datapath_types", &mut self.datapath_types, &other.datapath_types);
        scope.map("external_ids", &mut self.external_ids, &other.external_ids);
        scope.map("other_config", &mut self.other_config, &other.other_config);
        scope.extra(&mut self.extra, &other.extra);
    }
}

impl Mergeable for BridgeRecord {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn label(&self) -> String {
        format!("bridge {}", self.name)
    }

    fn absorb(&mut self, other: &Self, scope: &mut MergeScope<'_>) {
        scope.field("uuid", &mut self.uuid, &other.uuid);
        scope.field("fail_mode", &mut self.fail_mode, &other.fail_mode);
        scope.field("datapath_type", &mut self.datapath_type, &other.datapath_type);
        scope.refs(&mut self.port_refs, &other.port_refs);
        scope.map("external_ids", &mut self.external_ids, &other.external_ids);
        scope.extra(&mut self.extra, &other.extra);
    }
}

impl Mergeable for PortRecord {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn label(&self) -> String {
        format!("port {}", self.name)
    }

    fn absorb(&mut self, other: &Self, scope: &mut MergeScope<'_>) {
        scope.field("uuid", &mut self.uuid, &other.uuid);
        // Owning bridge is resolved by the builder, which reports its own conflicts.
        if self.bridge.is_none() {
            self.bridge = other.bridge.clone();
        }
        scope.field("tag", &mut self.tag, &other.tag);
        scope.refs(&mut self.interface_refs, &other.interface_refs);
        scope.map("external_ids", &mut self.external_ids, &other.external_ids);
        scope.extra(&mut self.extra, &other.extra);
    }
}

impl Mergeable for InterfaceRecord {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn label(&self) -> String {
        format!("interface {}", self.name)
    }

    fn absorb(&mut self, other: &Self, scope: &mut MergeScope<'_>) {
        scope.field("uuid", &mut self.uuid, &other.uuid);
        if self.port.is_none() {
            self.port = other.port.clone();
        }
        // A blank `type:` in a text dump says nothing; a database `""` is a
        // plain system interface and takes part in the precedence rule.
        let declared = |r: &InterfaceRecord| match r.source {
            SourceKind::Text => r.iface_type.as_ref().filter(|v| !v.is_empty()).cloned(),
            SourceKind::Database => r.iface_type.clone(),
        };
        let mut ours = declared(&*self);
        scope.field("type", &mut ours, &declared(other));
        self.iface_type = ours.or_else(|| self.iface_type.clone().or_else(|| other.iface_type.clone()));
        scope.field("link_state", &mut self.link_state, &other.link_state);
        scope.field("error", &mut self.error, &other.error);
        scope.field("ofport", &mut self.ofport, &other.ofport);
        scope.field("mac_in_use", &mut self.mac_in_use, &other.mac_in_use);
        scope.map("options", &mut self.options, &other.options);
        scope.map("external_ids", &mut self.external_ids, &other.external_ids);
        scope.extra(&mut self.extra, &other.extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use crate::model::{FailMode, LinkState};

    #[test]
    fn test_database_wins_and_conflict_is_reported() {
        let mut text = BridgeRecord::new(SourceKind::Text, "br-int");
        text.fail_mode = Some(FailMode::Standalone);
        text.external_ids.insert("ct-zone".into(), "1".into());

        let mut db = BridgeRecord::new(SourceKind::Database, "br-int");
        db.fail_mode = Some(FailMode::Secure);
        db.uuid = Some("b1".into());

        let mut diags = Vec::new();
        let mut merged = text.clone();
        merge_records(&mut merged, &db, &mut diags);

        assert_eq!(merged.source, SourceKind::Database);
        assert_eq!(merged.fail_mode, Some(FailMode::Secure));
        assert_eq!(merged.uuid.as_deref(), Some("b1"));
        assert_eq!(merged.external_ids.get("ct-zone").map(String::as_str), Some("1"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::ConsistencyWarning);
        assert!(diags[0].message.contains("fail_mode"));
        assert!(diags[0].message.contains("keeping database"));
    }

    #[test]
    fn test_gap_filling_is_silent() {
        let mut db = InterfaceRecord::new(SourceKind::Database, "veth1");
        db.ofport = Some(4);
        let mut text = InterfaceRecord::new(SourceKind::Text, "veth1");
        text.link_state = Some(LinkState::Up);
        text.iface_type = Some(String::new());

        let mut diags = Vec::new();
        merge_records(&mut db, &text, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(db.ofport, Some(4));
        assert_eq!(db.link_state, Some(LinkState::Up));
        assert_eq!(db.iface_type.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_and_absent_type_agree() {
        let mut db = InterfaceRecord::new(SourceKind::Database, "veth1");
        db.iface_type = Some(String::new());
        let text = InterfaceRecord::new(SourceKind::Text, "veth1");

        let mut diags = Vec::new();
        merge_records(&mut db, &text, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(db.iface_type.as_deref(), Some(""));
    }

    #[test]
    fn test_database_system_type_beats_text_type() {
        let mut db = InterfaceRecord::new(SourceKind::Database, "veth1");
        db.iface_type = Some(String::new());
        let mut text = InterfaceRecord::new(SourceKind::Text, "veth1");
        text.iface_type = Some("internal".to_string());

        for (first, second) in [(text.clone(), db.clone()), (db.clone(), text.clone())] {
            let mut diags = Vec::new();
            let mut merged = first;
            merge_records(&mut merged, &second, &mut diags);
            assert_eq!(merged.iface_type.as_deref(), Some(""));
            assert_eq!(diags.len(), 1);
            assert_eq!(diags[0].kind, DiagnosticKind::ConsistencyWarning);
            assert!(diags[0].message.contains("type"));
        }
    }

    #[test]
    fn test_blank_text_types_fill_nothing() {
        let mut first = InterfaceRecord::new(SourceKind::Text, "veth1");
        first.iface_type = Some(String::new());
        let mut second = InterfaceRecord::new(SourceKind::Text, "veth1");
        second.iface_type = Some("internal".to_string());

        let mut diags = Vec::new();
        merge_records(&mut first, &second, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(first.iface_type.as_deref(), Some("internal"));
    }

    #[test]
    fn test_draft_tracks_sources() {
        let mut draft = Draft::new(PortRecord::new(SourceKind::Text, "p1"));
        let mut diags = Vec::new();
        draft.absorb(&PortRecord::new(SourceKind::Database, "p1"), &mut diags);
        assert_eq!(draft.sources.len(), 2);
        assert_eq!(draft.record.source, SourceKind::Database);
    }
}
