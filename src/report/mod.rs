//! Report assembly and rendering.
//!
//! One section per component, each explicitly available, unavailable or
//! omitted, plus run metadata, input fingerprints, findings and every
//! diagnostic collected along the way.

pub mod assemble;
pub mod model;
pub mod render;

pub use assemble::{assemble, fatal_report, raw_query_report, DatabaseState, ReportParts, TextState};
pub use model::*;
pub use render::{render_compact, render_json};
