//! Switch data model.
//!
//! `records` are what parsers emit, one per source line/row/block.
//! `entities` are the linked graph the builder and correlator produce.

pub mod entities;
pub mod records;

pub use entities::*;
pub use records::*;
