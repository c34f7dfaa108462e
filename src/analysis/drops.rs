//! Drop-rule classification.

use serde::{Deserialize, Serialize};

use crate::correlate::CorrelatedModel;
use crate::model::Flow;
use crate::parsers::tokenize::split_top_level;

/// Whether an action list discards packets: empty, or containing a
/// top-level `drop` action.
pub fn denotes_drop(actions: &str) -> bool {
    let trimmed = actions.trim();
    trimmed.is_empty()
        || split_top_level(trimmed, ',')
            .into_iter()
            .any(|a| a.trim().eq_ignore_ascii_case("drop"))
}

/// A drop rule that has matched traffic.
pub fn is_active_drop(flow: &Flow) -> bool {
    denotes_drop(&flow.actions) && flow.packet_count > 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropRule {
    pub bridge: String,
    pub table: u8,
    pub priority: u16,
    pub match_expr: String,
    pub actions: String,
    pub packet_count: u64,
    pub byte_count: u64,
    pub cookie: Option<String>,
}

impl From<&Flow> for DropRule {
    fn from(flow: &Flow) -> Self {
        Self {
            bridge: flow.bridge.clone(),
            table: flow.table,
            priority: flow.priority,
            match_expr: flow.match_expr.clone(),
            actions: flow.actions.clone(),
            packet_count: flow.packet_count,
            byte_count: flow.byte_count,
            cookie: flow.cookie.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropReport {
    /// Drop rules with `packet_count > 0`, most hits first.
    pub active: Vec<DropRule>,
    /// Configured drop rules that never matched.
    pub inactive: Vec<DropRule>,
}

impl DropReport {
    pub fn dropped_packets(&self) -> u64 {
        self.active.iter().map(|d| d.packet_count).sum()
    }
}

/// Classify every attached flow.
pub fn classify_drops(model: &CorrelatedModel) -> DropReport {
    let mut report = DropReport::default();
    for flow in model.bridges.values().flat_map(|b| b.flows()) {
        if !denotes_drop(&flow.actions) {
            continue;
        }
        if flow.packet_count > 0 {
            report.active.push(DropRule::from(flow));
        } else {
            report.inactive.push(DropRule::from(flow));
        }
    }
    report
        .active
        .sort_by(|a, b| b.packet_count.cmp(&a.packet_count).then_with(|| a.match_expr.cmp(&b.match_expr)));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denotes_drop() {
        assert!(denotes_drop("drop"));
        assert!(denotes_drop(""));
        assert!(denotes_drop("  "));
        assert!(denotes_drop("ct(commit),drop"));
        assert!(!denotes_drop("output:2"));
        assert!(!denotes_drop("load:0x1->NXM_NX_REG10[0],resubmit(,38)"));
        // `drop` inside a nested action is not a top-level drop.
        assert!(!denotes_drop("clone(drop),output:1"));
    }
}
