//! Structured logging utilities.
//!
//! Provides context-aware logging with run_id and source included
//! in every log message.

use std::fmt;

/// Logging context for one analysis run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub source: Option<String>,
}

impl LogContext {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            source: None,
        }
    }

    /// Narrow the context to a single input (dump file, table, bridge).
    pub fn with_source(&self, source: &str) -> Self {
        Self {
            run_id: self.run_id.clone(),
            source: Some(source.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "[run={}] [source={}]", self.run_id, src),
            None => write!(f, "[run={}]", self.run_id),
        }
    }
}

/// Initialize the process-wide logger.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init_logger(level: log::LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::info!(
            concat!("{} {}", $(" ", stringify!($key), "={:?}"),*),
            $ctx,
            $event
            $(, $value)*
        );
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::warn!(
            concat!("{} {}", $(" ", stringify!($key), "={:?}"),*),
            $ctx,
            $event
            $(, $value)*
        );
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),* $(,)?) => {
        log::debug!(
            concat!("{} {}", $(" ", stringify!($key), "={:?}"),*),
            $ctx,
            $event
            $(, $value)*
        );
    };
}
