//! Structured logging with run context.
//!
//! Provides logging macros and utilities that include the run id and, where
//! relevant, the input being processed in every log message.

pub mod structured;

pub use structured::*;
