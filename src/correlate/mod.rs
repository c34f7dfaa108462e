//! Flow and counter correlation.
//!
//! Attaches flow and port-statistics records to the bridges of a built
//! topology and computes per-bridge aggregates. Records naming a bridge the
//! topology does not know are kept in unattached buckets, never dropped.

pub mod correlator;
pub mod model;

pub use correlator::{correlate, rank_top_flows, resolve_port_id};
pub use model::{BridgeActivity, CorrelatedModel};
