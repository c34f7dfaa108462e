//! Topology reconstruction.
//!
//! Turns the union of bridge, port and interface records from both sources
//! into the linked ownership graph, reconciling duplicates with an explicit
//! precedence rule.

pub mod builder;
pub mod merge;

pub use builder::build_topology;
pub use merge::{merge_records, Draft, Mergeable, MergeScope, TOPOLOGY_SOURCE};
