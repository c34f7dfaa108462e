//! Run context.
//!
//! Identity, timing and cancellation for one analysis run.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DiagError, Result};
use crate::logging::structured::LogContext;

/// Which sources a run consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Database snapshot and text dumps.
    #[default]
    Full,
    DatabaseOnly,
    TextOnly,
    /// Forward one caller-supplied transaction to the snapshot and stop.
    RawQuery,
}

impl RunMode {
    pub fn uses_database(&self) -> bool {
        !matches!(self, RunMode::TextOnly)
    }

    pub fn uses_text(&self) -> bool {
        matches!(self, RunMode::Full | RunMode::TextOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::DatabaseOnly => "database_only",
            RunMode::TextOnly => "text_only",
            RunMode::RawQuery => "raw_query",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = DiagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(RunMode::Full),
            "db" | "database" | "database_only" | "database-only" => Ok(RunMode::DatabaseOnly),
            "text" | "text_only" | "text-only" => Ok(RunMode::TextOnly),
            "query" | "raw" | "raw_query" | "raw-query" => Ok(RunMode::RawQuery),
            other => Err(DiagError::Config {
                message: format!("unknown mode {:?}", other),
            }),
        }
    }
}

/// Context for one run.
///
/// Clones share the cancellation flag, so a clone handed to another thread
/// can stop the run between stages.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub mode: RunMode,
    cancelled: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new(mode: RunMode) -> Self {
        Self {
            run_id: format!("run-{}", &Uuid::new_v4().to_string()[..8]),
            started_at: Utc::now(),
            mode,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.run_id)
    }

    /// Request cancellation. Takes effect at the next stage boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Stage boundary check.
    pub fn checkpoint(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            log::warn!("{} RUN_CANCELLED stage={}", self.log_context(), stage);
            return Err(DiagError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_shape() {
        let run = RunContext::new(RunMode::Full);
        assert!(run.run_id.starts_with("run-"));
        assert_eq!(run.run_id.len(), 12);
        assert_eq!(format!("{}", run.log_context()), format!("[run={}]", run.run_id));
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let run = RunContext::new(RunMode::TextOnly);
        let handle = run.clone();
        assert!(run.checkpoint("parse").is_ok());
        handle.cancel();
        match run.checkpoint("correlate") {
            Err(DiagError::Cancelled { stage }) => assert_eq!(stage, "correlate"),
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("db".parse::<RunMode>().unwrap(), RunMode::DatabaseOnly);
        assert_eq!("Text".parse::<RunMode>().unwrap(), RunMode::TextOnly);
        assert_eq!("full".parse::<RunMode>().unwrap(), RunMode::Full);
        assert!("live".parse::<RunMode>().is_err());
        assert!(RunMode::DatabaseOnly.uses_database());
        assert!(!RunMode::DatabaseOnly.uses_text());
        assert!(!RunMode::RawQuery.uses_text());
    }
}
