//! Error and diagnostic types.
//!
//! Two layers:
//! - `DiagError` is returned through `Result` when a whole operation fails
//!   (one parser on one input, one adapter query, or the entire run).
//! - `Diagnostic` is a non-fatal issue collected by a stage and surfaced in
//!   the report. Stages return `(result, Vec<Diagnostic>)` instead of failing
//!   on the first problem.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation-level failure.
#[derive(Error, Debug)]
pub enum DiagError {
    /// An expected input is absent. Informational: the section is omitted.
    #[error("Source missing: {source_name}")]
    SourceMissing { source_name: String },

    /// The whole input does not look like the dump kind it was routed to.
    #[error("Unsupported format for {kind}: {reason}")]
    UnsupportedFormat { kind: String, reason: String },

    /// The external database query capability is not installed.
    #[error("Tool unavailable: {tool}")]
    ToolUnavailable { tool: String },

    /// The snapshot file exists but could not be opened as a database.
    #[error("Snapshot unreadable: {path} - {reason}")]
    SnapshotUnreadable { path: String, reason: String },

    /// A single query failed (bad query, unknown table, timeout).
    #[error("Query error: {reason}")]
    QueryError { reason: String },

    /// The query tool did not answer in time and was killed. Further
    /// queries against the same snapshot are not attempted.
    #[error("Query timed out after {secs}s: {tool}")]
    QueryTimeout { tool: String, secs: u64 },

    /// The caller cancelled the run; partial results were discarded.
    #[error("Analysis cancelled during {stage}")]
    Cancelled { stage: String },

    /// Neither a database snapshot nor any recognised text dump was usable.
    #[error("No usable sources: {reason}")]
    NoSources { reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DiagError {
    /// The diagnostic kind this failure is reported as.
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            DiagError::SourceMissing { .. } => DiagnosticKind::SourceMissing,
            DiagError::UnsupportedFormat { .. } => DiagnosticKind::UnsupportedFormat,
            DiagError::ToolUnavailable { .. } => DiagnosticKind::ToolUnavailable,
            DiagError::SnapshotUnreadable { .. } => DiagnosticKind::SnapshotUnreadable,
            DiagError::QueryError { .. } | DiagError::QueryTimeout { .. } => {
                DiagnosticKind::QueryError
            }
            DiagError::Cancelled { .. }
            | DiagError::NoSources { .. }
            | DiagError::Config { .. }
            | DiagError::Io { .. } => DiagnosticKind::Fatal,
        }
    }

    /// Convert into a report diagnostic attributed to `source`.
    pub fn to_diagnostic(&self, source: &str) -> Diagnostic {
        Diagnostic::new(self.kind(), source, self.to_string())
    }

    /// Whether the run can continue after this error.
    pub fn is_fatal(&self) -> bool {
        self.kind() == DiagnosticKind::Fatal
    }
}

pub type Result<T> = std::result::Result<T, DiagError>;

/// Category of a non-fatal issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    SourceMissing,
    ParseWarning,
    UnsupportedFormat,
    ToolUnavailable,
    SnapshotUnreadable,
    QueryError,
    ConsistencyWarning,
    Fatal,
}

impl DiagnosticKind {
    /// Informational kinds do not turn a successful run into "ran with warnings".
    pub fn is_informational(&self) -> bool {
        matches!(self, DiagnosticKind::SourceMissing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::SourceMissing => "source_missing",
            DiagnosticKind::ParseWarning => "parse_warning",
            DiagnosticKind::UnsupportedFormat => "unsupported_format",
            DiagnosticKind::ToolUnavailable => "tool_unavailable",
            DiagnosticKind::SnapshotUnreadable => "snapshot_unreadable",
            DiagnosticKind::QueryError => "query_error",
            DiagnosticKind::ConsistencyWarning => "consistency_warning",
            DiagnosticKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal issue collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Input name, table name, or stage that produced the issue.
    pub source: String,
    /// 1-based line number for text inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, source: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.to_string(),
            line: None,
            message: message.into(),
        }
    }

    /// A skipped malformed line.
    pub fn malformed_line(source: &str, line: usize, reason: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::ParseWarning,
            source: source.to_string(),
            line: Some(line),
            message: reason.into(),
        }
    }

    pub fn consistency(source: &str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::ConsistencyWarning, source, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[{}] {}:{}: {}", self.kind, self.source, line, self.message),
            None => write!(f, "[{}] {}: {}", self.kind, self.source, self.message),
        }
    }
}
