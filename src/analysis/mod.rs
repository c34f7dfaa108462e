//! Anomaly analysis over the correlated model.
//!
//! Every check is a pure function of the model and configuration. Results
//! are separate values; the model itself is never annotated in place.

pub mod analyzer;
pub mod capacity;
pub mod coverage;
pub mod drops;
pub mod findings;
pub mod pod_mapping;
pub mod port_health;

pub use analyzer::{analyze, Analysis};
pub use capacity::{classify_usage, flow_table_health, usage_percent, CapacityStatus, FlowTableHealth};
pub use coverage::{coverage_rates, CoverageRate};
pub use drops::{classify_drops, denotes_drop, is_active_drop, DropReport, DropRule};
pub use findings::{sort_findings, Finding, FindingCode, Severity};
pub use pod_mapping::{
    best_match, map_pods, matcher_registry, matcher_registry_mut, Confidence, MatcherRegistry,
    NamePatternMatcher, PodMappingReport, PodMatch, PodMatcher,
};
pub use port_health::{flagged_ports, interface_issues, InterfaceIssue, InterfaceProblem, PortHealth};
