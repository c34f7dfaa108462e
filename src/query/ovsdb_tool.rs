//! Snapshot queries through the external `ovsdb-tool query` command.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{DiagError, Result};

use super::{rows_from_reply, select_transaction, Row, SnapshotQuery};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long the pipe readers get to finish after a timed-out child is killed.
/// Descendants of the tool can keep the pipes open past that.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Runs `<tool> query <db> <transaction>` with a bounded wait.
#[derive(Debug, Clone)]
pub struct OvsdbToolAdapter {
    tool: String,
    db_path: PathBuf,
    database: String,
    timeout: Duration,
}

impl OvsdbToolAdapter {
    pub fn new(db_path: impl Into<PathBuf>, config: &EngineConfig) -> Self {
        Self {
            tool: config.ovsdb_tool.clone(),
            db_path: db_path.into(),
            database: config.database.clone(),
            timeout: config.query_timeout(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn run(&self, transaction: &str) -> Result<Value> {
        if !self.db_path.is_file() {
            return Err(DiagError::SourceMissing {
                source_name: self.db_path.display().to_string(),
            });
        }

        log::debug!(
            "QUERY_EXEC tool={} db={} timeout_secs={}",
            self.tool,
            self.db_path.display(),
            self.timeout.as_secs()
        );

        let mut child = Command::new(&self.tool)
            .arg("query")
            .arg(&self.db_path)
            .arg(transaction)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => DiagError::ToolUnavailable {
                    tool: self.tool.clone(),
                },
                _ => DiagError::Io {
                    path: self.tool.clone(),
                    source: e,
                },
            })?;

        // Drain both pipes off-thread so a chatty child cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.wait_bounded(&mut child) {
            Ok(status) => status,
            Err(e) => {
                release(stdout);
                release(stderr);
                return Err(e);
            }
        };
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(self.classify_failure(stderr.trim()));
        }

        serde_json::from_str(stdout.trim()).map_err(|e| DiagError::QueryError {
            reason: format!("tool output is not JSON: {}", e),
        })
    }

    fn wait_bounded(&self, child: &mut Child) -> Result<std::process::ExitStatus> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    return Err(DiagError::Io {
                        path: self.tool.clone(),
                        source: e,
                    })
                }
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!(
                    "QUERY_TIMEOUT tool={} timeout_secs={}",
                    self.tool,
                    self.timeout.as_secs()
                );
                return Err(DiagError::QueryTimeout {
                    tool: self.tool.clone(),
                    secs: self.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Failures that mention the database file are about the snapshot itself;
    /// anything else is scoped to the query.
    fn classify_failure(&self, stderr: &str) -> DiagError {
        let file_name = self
            .db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mentions_db = (!file_name.is_empty() && stderr.contains(&file_name))
            || stderr.contains("I/O error")
            || stderr.contains("not an OVSDB file");
        if mentions_db {
            DiagError::SnapshotUnreadable {
                path: self.db_path.display().to_string(),
                reason: stderr.to_string(),
            }
        } else {
            DiagError::QueryError {
                reason: if stderr.is_empty() {
                    "tool exited with failure".to_string()
                } else {
                    stderr.to_string()
                },
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

/// Join a reader of a killed child, or detach it if the pipe is still held.
fn release(reader: thread::JoinHandle<String>) {
    let deadline = Instant::now() + DRAIN_GRACE;
    while !reader.is_finished() && Instant::now() < deadline {
        thread::sleep(POLL_INTERVAL);
    }
    if reader.is_finished() {
        let _ = reader.join();
    } else {
        log::debug!("QUERY_READER_DETACHED");
    }
}

impl SnapshotQuery for OvsdbToolAdapter {
    fn describe(&self) -> String {
        self.db_path.display().to_string()
    }

    fn table(&self, table: &str) -> Result<Vec<Row>> {
        let reply = self.run(&select_transaction(&self.database, table))?;
        rows_from_reply(&reply)
    }

    fn raw_query(&self, transaction: &str) -> Result<Value> {
        self.run(transaction)
    }
}
