//! Run orchestration.
//!
//! Coordinates one analysis run:
//! 1. Parse every text dump (one scoped worker per file)
//! 2. Read the database snapshot through the query adapter
//! 3. Build the topology from both sources
//! 4. Correlate flows and counters
//! 5. Analyze
//! 6. Assemble the report
//!
//! The cancellation flag is checked between stages. A snapshot that cannot
//! be queried degrades the run to text-only; only the absence of every
//! usable source is fatal.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use crate::analysis::{analyze, matcher_registry, NamePatternMatcher, PodMatcher};
use crate::config::EngineConfig;
use crate::correlate::correlate;
use crate::error::{DiagError, Diagnostic, DiagnosticKind, Result};
use crate::logging::structured::LogContext;
use crate::model::Record;
use crate::parsers::snapshot::{records_from_rows, SNAPSHOT_TABLES};
use crate::parsers::{parse_dump, DumpInput, DumpKind, DumpTag, ParseOutput};
use crate::query::{OvsdbToolAdapter, SnapshotQuery, StaticSnapshot};
use crate::report::{
    assemble, raw_query_report, DatabaseState, DatabaseSummary, InputStatus, InputSummary, Report,
    ReportParts, TextState,
};
use crate::topology::build_topology;

use super::context::{RunContext, RunMode};

/// File name of a raw OVSDB snapshot inside a capture directory.
pub const SNAPSHOT_DB_NAME: &str = "conf.db";

/// File name of a snapshot already exported to JSON.
pub const SNAPSHOT_EXPORT_NAME: &str = "conf.db.json";

/// Dump kinds whose absence is worth a `SourceMissing` note.
const EXPECTED_DUMPS: &[DumpTag] = &[
    DumpTag::TopologyShow,
    DumpTag::Flows,
    DumpTag::PortStats,
    DumpTag::Tunnels,
    DumpTag::Coverage,
    DumpTag::Capacity,
];

/// One captured text file, read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    pub name: String,
    pub content: String,
}

/// Where database rows come from.
pub enum SnapshotSource {
    Absent,
    /// A snapshot was found but cannot be opened.
    Unusable { origin: String, error: DiagError },
    Query(Box<dyn SnapshotQuery>),
}

impl SnapshotSource {
    /// Adapter for a snapshot path: JSON exports are read directly, anything
    /// else goes through `ovsdb-tool`.
    pub fn from_path(path: &Path, config: &EngineConfig) -> Self {
        let is_export = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if !is_export {
            return SnapshotSource::Query(Box::new(OvsdbToolAdapter::new(path, config)));
        }
        match StaticSnapshot::from_path(path) {
            Ok(snapshot) => SnapshotSource::Query(Box::new(snapshot)),
            Err(error) => SnapshotSource::Unusable {
                origin: path.display().to_string(),
                error,
            },
        }
    }

    fn origin(&self) -> Option<String> {
        match self {
            SnapshotSource::Absent => None,
            SnapshotSource::Unusable { origin, .. } => Some(origin.clone()),
            SnapshotSource::Query(q) => Some(q.describe()),
        }
    }
}

impl std::fmt::Debug for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotSource::Absent => write!(f, "Absent"),
            SnapshotSource::Unusable { origin, error } => {
                write!(f, "Unusable({}: {})", origin, error)
            }
            SnapshotSource::Query(q) => write!(f, "Query({})", q.describe()),
        }
    }
}

/// Everything one run reads.
#[derive(Debug)]
pub struct RunInputs {
    pub dumps: Vec<DumpFile>,
    pub snapshot: SnapshotSource,
    /// Transaction forwarded verbatim in raw query mode.
    pub raw_query: Option<String>,
}

impl Default for RunInputs {
    fn default() -> Self {
        Self {
            dumps: Vec::new(),
            snapshot: SnapshotSource::Absent,
            raw_query: None,
        }
    }
}

impl RunInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dump(mut self, name: &str, content: &str) -> Self {
        self.dumps.push(DumpFile {
            name: name.to_string(),
            content: content.to_string(),
        });
        self
    }

    pub fn with_snapshot(mut self, snapshot: Box<dyn SnapshotQuery>) -> Self {
        self.snapshot = SnapshotSource::Query(snapshot);
        self
    }

    pub fn with_raw_query(mut self, transaction: &str) -> Self {
        self.raw_query = Some(transaction.to_string());
        self
    }

    /// Read every regular file of a capture directory (no recursion).
    ///
    /// `conf.db` and `conf.db.json` are taken as the snapshot unless
    /// `snapshot_path` names one explicitly; everything else is a text dump.
    /// Non-UTF-8 bytes are replaced rather than rejected.
    pub fn load_dir(dir: &Path, snapshot_path: Option<&Path>, config: &EngineConfig) -> Result<Self> {
        let io_err = |source| DiagError::Io {
            path: dir.display().to_string(),
            source,
        };
        let mut inputs = Self::new();
        let mut found_db = None;
        let mut found_export = None;

        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if !entry.file_type().map_err(io_err)?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == SNAPSHOT_DB_NAME {
                found_db = Some(path);
                continue;
            }
            if name == SNAPSHOT_EXPORT_NAME {
                found_export = Some(path);
                continue;
            }
            let bytes = fs::read(&path).map_err(|source| DiagError::Io {
                path: path.display().to_string(),
                source,
            })?;
            inputs.dumps.push(DumpFile {
                name,
                content: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        inputs.dumps.sort_by(|a, b| a.name.cmp(&b.name));

        let snapshot = snapshot_path
            .map(Path::to_path_buf)
            .or(found_export)
            .or(found_db);
        if let Some(path) = snapshot {
            inputs.snapshot = SnapshotSource::from_path(&path, config);
        }
        Ok(inputs)
    }
}

/// Outcome of parsing one dump.
struct ParsedDump {
    summary: InputSummary,
    tag: Option<DumpTag>,
    output: Option<ParseOutput>,
    failure: Option<Diagnostic>,
}

fn parse_one(file: &DumpFile, ctx: &LogContext) -> ParsedDump {
    let Some(kind) = DumpKind::from_file_name(&file.name) else {
        crate::log_debug!(ctx, "INPUT_UNRECOGNISED", name = file.name);
        return ParsedDump {
            summary: InputSummary::for_content(&file.name, None, &file.content, InputStatus::Unrecognised),
            tag: None,
            output: None,
            failure: None,
        };
    };

    let input = DumpInput {
        name: &file.name,
        kind: &kind,
        content: &file.content,
    };
    let mut summary =
        InputSummary::for_content(&file.name, Some(kind.to_string()), &file.content, InputStatus::Parsed);

    match parse_dump(&input, ctx) {
        Ok(output) => {
            summary.records = output.records.len();
            summary.issues = output.issues.len();
            ParsedDump {
                summary,
                tag: Some(kind.tag()),
                output: Some(output),
                failure: None,
            }
        }
        Err(e) => {
            summary.status = InputStatus::Rejected;
            summary.issues = 1;
            ParsedDump {
                summary,
                tag: Some(kind.tag()),
                output: None,
                failure: Some(e.to_diagnostic(&file.name)),
            }
        }
    }
}

fn aborted(file: &DumpFile) -> ParsedDump {
    let kind = DumpKind::from_file_name(&file.name);
    let mut summary = InputSummary::for_content(
        &file.name,
        kind.as_ref().map(DumpKind::to_string),
        &file.content,
        InputStatus::Rejected,
    );
    summary.issues = 1;
    ParsedDump {
        summary,
        tag: kind.map(|k| k.tag()),
        output: None,
        failure: Some(Diagnostic::new(
            DiagnosticKind::UnsupportedFormat,
            &file.name,
            "parser aborted on this input",
        )),
    }
}

fn parse_all(files: &[DumpFile], parallel: bool, ctx: &LogContext) -> Vec<ParsedDump> {
    if !parallel || files.len() < 2 {
        return files.iter().map(|f| parse_one(f, ctx)).collect();
    }
    thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| (file, scope.spawn(move || parse_one(file, ctx))))
            .collect();
        handles
            .into_iter()
            .map(|(file, handle)| handle.join().unwrap_or_else(|_| aborted(file)))
            .collect()
    })
}

fn skipped(files: &[DumpFile]) -> Vec<InputSummary> {
    files
        .iter()
        .map(|f| {
            InputSummary::for_content(
                &f.name,
                DumpKind::from_file_name(&f.name).map(|k| k.to_string()),
                &f.content,
                InputStatus::Skipped,
            )
        })
        .collect()
}

/// Outcome of the snapshot stage.
struct DatabaseStage {
    state: DatabaseState,
    records: Vec<Record>,
    diagnostics: Vec<Diagnostic>,
    summary: Option<InputSummary>,
}

fn snapshot_summary(origin: &str, records: usize, issues: usize, status: InputStatus) -> InputSummary {
    InputSummary {
        name: origin.to_string(),
        kind: Some("snapshot".to_string()),
        sha256: None,
        bytes: None,
        records,
        issues,
        status,
    }
}

fn snapshot_failure(origin: &str, error: &DiagError, ctx: &LogContext) -> DatabaseStage {
    crate::log_warn!(
        ctx,
        "DATABASE_FALLBACK_TEXT_ONLY",
        origin = origin,
        kind = error.kind().as_str(),
        error = error.to_string(),
    );
    let state = match error {
        DiagError::SourceMissing { .. } => DatabaseState::Missing,
        _ => DatabaseState::Failed {
            reason: error.to_string(),
        },
    };
    DatabaseStage {
        state,
        records: Vec::new(),
        diagnostics: vec![error.to_diagnostic(origin)],
        summary: Some(snapshot_summary(origin, 0, 1, InputStatus::Unavailable)),
    }
}

fn load_database(query: &dyn SnapshotQuery, ctx: &LogContext) -> DatabaseStage {
    let origin = query.describe();
    let ctx = ctx.with_source(&origin);
    let mut records = Vec::new();
    let mut diagnostics = Vec::new();
    let mut tables = BTreeMap::new();

    for table in SNAPSHOT_TABLES {
        match query.table(table) {
            Ok(rows) => {
                let output = records_from_rows(table, &rows, &origin);
                tables.insert(table.to_string(), rows.len());
                records.extend(output.records);
                diagnostics.extend(output.issues);
            }
            Err(e @ DiagError::QueryError { .. }) => {
                crate::log_warn!(ctx, "TABLE_QUERY_FAILED", table = table, error = e.to_string());
                diagnostics.push(e.to_diagnostic(&origin));
            }
            // Unavailable, unreadable or timed out: stop asking this snapshot.
            Err(e) => return snapshot_failure(&origin, &e, &ctx),
        }
    }

    let issues = diagnostics.len();
    if tables.is_empty() {
        return DatabaseStage {
            state: DatabaseState::Failed {
                reason: "every table query failed".to_string(),
            },
            records,
            diagnostics,
            summary: Some(snapshot_summary(&origin, 0, issues, InputStatus::Unavailable)),
        };
    }

    crate::log_info!(ctx, "DATABASE_LOADED", tables = tables.len(), records = records.len());
    DatabaseStage {
        state: DatabaseState::Loaded(DatabaseSummary {
            origin: origin.clone(),
            tables,
        }),
        summary: Some(snapshot_summary(&origin, records.len(), issues, InputStatus::Parsed)),
        records,
        diagnostics,
    }
}

fn missing_dump_notes(parsed: &[ParsedDump]) -> Vec<Diagnostic> {
    let present: BTreeSet<DumpTag> = parsed.iter().filter_map(|p| p.tag).collect();
    EXPECTED_DUMPS
        .iter()
        .filter(|tag| !present.contains(tag))
        .filter(|tag| !(**tag == DumpTag::TopologyShow && present.contains(&DumpTag::TableList)))
        .map(|tag| {
            Diagnostic::new(
                DiagnosticKind::SourceMissing,
                tag.as_str(),
                format!("no {} dump in capture", tag),
            )
        })
        .collect()
}

/// Configured engine: settings plus the pod matchers for this run.
pub struct Engine {
    config: EngineConfig,
    matchers: Vec<Arc<dyn PodMatcher>>,
}

impl Engine {
    /// Snapshot the process-wide matcher registry and add the configured
    /// name patterns after it.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut matchers = matcher_registry().matchers().to_vec();
        for pattern in &config.pod_name_patterns {
            matchers.push(Arc::new(NamePatternMatcher::new(pattern)?));
        }
        Ok(Self { config, matchers })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn matchers(&self) -> &[Arc<dyn PodMatcher>] {
        &self.matchers
    }

    /// Run every stage and assemble the report.
    ///
    /// Errors only when the run is cancelled, when no source is usable, or
    /// when raw query mode has nothing to query.
    pub fn run(&self, run: &RunContext, inputs: RunInputs) -> Result<Report> {
        let ctx = run.log_context();
        crate::log_info!(
            ctx,
            "RUN_START",
            mode = run.mode.as_str(),
            dumps = inputs.dumps.len(),
            snapshot = inputs.snapshot.origin(),
        );

        if run.mode == RunMode::RawQuery {
            return self.run_raw_query(run, inputs);
        }

        // Stage 1: text dumps
        let (parsed, mut input_summaries) = if run.mode.uses_text() {
            (parse_all(&inputs.dumps, self.config.parallel, &ctx), Vec::new())
        } else {
            (Vec::new(), skipped(&inputs.dumps))
        };
        run.checkpoint("parse")?;

        // Stage 2: snapshot
        let database = if !run.mode.uses_database() {
            DatabaseStage {
                state: DatabaseState::NotConsulted,
                records: Vec::new(),
                diagnostics: Vec::new(),
                summary: inputs
                    .snapshot
                    .origin()
                    .map(|o| snapshot_summary(&o, 0, 0, InputStatus::Skipped)),
            }
        } else {
            match &inputs.snapshot {
                SnapshotSource::Absent => DatabaseStage {
                    state: DatabaseState::Missing,
                    records: Vec::new(),
                    diagnostics: vec![Diagnostic::new(
                        DiagnosticKind::SourceMissing,
                        SNAPSHOT_DB_NAME,
                        "no database snapshot in capture",
                    )],
                    summary: None,
                },
                SnapshotSource::Unusable { origin, error } => snapshot_failure(origin, error, &ctx),
                SnapshotSource::Query(query) => load_database(query.as_ref(), &ctx),
            }
        };
        run.checkpoint("database")?;

        let text_usable = parsed.iter().any(|p| p.output.is_some());
        let database_usable = matches!(database.state, DatabaseState::Loaded(_));
        if !text_usable && !database_usable {
            let recognised = parsed.iter().filter(|p| p.tag.is_some()).count();
            let reason = format!(
                "no readable database snapshot and none of {} text dumps ({} recognised) could be parsed",
                inputs.dumps.len(),
                recognised
            );
            crate::log_warn!(ctx, "RUN_NO_SOURCES", dumps = inputs.dumps.len(), recognised = recognised);
            return Err(DiagError::NoSources { reason });
        }

        // Database records go first so they seed every entity.
        let mut records = database.records;
        let mut diagnostics = database.diagnostics;
        let mut text = TextState {
            consulted: run.mode.uses_text(),
            ..TextState::default()
        };
        if run.mode.uses_text() {
            diagnostics.extend(missing_dump_notes(&parsed));
        }
        for dump in parsed {
            if let Some(tag) = dump.tag {
                if dump.output.is_some() {
                    text.parsed.insert(tag);
                } else {
                    text.rejected.insert(tag);
                }
            }
            if let Some(output) = dump.output {
                records.extend(output.records);
                diagnostics.extend(output.issues);
            }
            diagnostics.extend(dump.failure);
            input_summaries.push(dump.summary);
        }
        input_summaries.extend(database.summary);

        // Stage 3: topology
        let (topology, topology_diags) = build_topology(&records, &ctx);
        diagnostics.extend(topology_diags);
        run.checkpoint("topology")?;

        // Stage 4: correlation
        let (model, correlation_diags) = correlate(topology, &records, &self.config, &ctx);
        diagnostics.extend(correlation_diags);
        run.checkpoint("correlate")?;

        // Stage 5: analysis
        let analysis = analyze(&model, &self.config, &self.matchers, &ctx);
        run.checkpoint("analyze")?;

        let report = assemble(
            run,
            ReportParts {
                inputs: input_summaries,
                database: database.state,
                text,
                model,
                analysis,
                diagnostics,
            },
        );

        crate::log_info!(
            ctx,
            "RUN_COMPLETE",
            status = report.status,
            inputs = report.inputs.len(),
            findings = report.findings.len(),
            diagnostics = report.diagnostics.total,
        );
        Ok(report)
    }

    fn run_raw_query(&self, run: &RunContext, inputs: RunInputs) -> Result<Report> {
        let ctx = run.log_context();
        let transaction = inputs.raw_query.as_deref().ok_or_else(|| DiagError::Config {
            message: "raw query mode needs a transaction".to_string(),
        })?;
        let summaries = skipped(&inputs.dumps);

        let query = match &inputs.snapshot {
            SnapshotSource::Absent => {
                return Err(DiagError::NoSources {
                    reason: "raw query mode needs a database snapshot".to_string(),
                })
            }
            SnapshotSource::Unusable { origin, error } => {
                let diagnostics = vec![error.to_diagnostic(origin)];
                return Ok(raw_query_report(run, summaries, None, diagnostics));
            }
            SnapshotSource::Query(query) => query,
        };

        let origin = query.describe();
        let report = match query.raw_query(transaction) {
            Ok(reply) => {
                crate::log_info!(ctx, "RAW_QUERY_COMPLETE", origin = origin);
                raw_query_report(run, summaries, Some(reply), Vec::new())
            }
            Err(e) => {
                crate::log_warn!(ctx, "RAW_QUERY_FAILED", origin = origin, error = e.to_string());
                raw_query_report(run, summaries, None, vec![e.to_diagnostic(&origin)])
            }
        };
        run.checkpoint("raw_query")?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{RunStatus, Section};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SHOW: &str = "\
0a1b2c3d-0000-0000-0000-000000000001
    Bridge br-int
        fail_mode: secure
        Port br-int
            Interface br-int
                type: internal
        Port veth1
            Interface veth1
    ovs_version: \"3.1.2\"
";

    const FLOWS: &str = "\
NXST_FLOW reply (xid=0x4):
 cookie=0x0, duration=10.5s, table=0, n_packets=12, n_bytes=720, priority=100,ip,nw_src=10.0.0.9 actions=drop
 cookie=0x0, duration=10.5s, table=0, n_packets=40, n_bytes=2400, priority=10,in_port=1 actions=NORMAL
";

    struct UnavailableTool;

    impl SnapshotQuery for UnavailableTool {
        fn describe(&self) -> String {
            "conf.db".to_string()
        }

        fn table(&self, _table: &str) -> Result<Vec<crate::query::Row>> {
            Err(DiagError::ToolUnavailable {
                tool: "ovsdb-tool".to_string(),
            })
        }

        fn raw_query(&self, _transaction: &str) -> Result<serde_json::Value> {
            Err(DiagError::ToolUnavailable {
                tool: "ovsdb-tool".to_string(),
            })
        }
    }

    /// Every query hangs until the tool is killed.
    struct HungTool {
        calls: Arc<AtomicUsize>,
    }

    impl SnapshotQuery for HungTool {
        fn describe(&self) -> String {
            "conf.db".to_string()
        }

        fn table(&self, _table: &str) -> Result<Vec<crate::query::Row>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DiagError::QueryTimeout {
                tool: "ovsdb-tool".to_string(),
                secs: 10,
            })
        }

        fn raw_query(&self, _transaction: &str) -> Result<serde_json::Value> {
            Err(DiagError::QueryTimeout {
                tool: "ovsdb-tool".to_string(),
                secs: 10,
            })
        }
    }

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_text_only_run() {
        let run = RunContext::new(RunMode::TextOnly);
        let inputs = RunInputs::new()
            .with_dump("ovs-vsctl_show", SHOW)
            .with_dump("ovs-ofctl_dump-flows_br-int", FLOWS)
            .with_dump("notes.md", "unrelated");
        let report = engine().run(&run, inputs).unwrap();

        assert!(report.topology.is_available());
        assert!(matches!(report.database, Section::Omitted { .. }));
        assert_eq!(report.drops.data().unwrap().active.len(), 1);
        assert_eq!(report.inputs.len(), 3);
        assert!(report
            .inputs
            .iter()
            .any(|i| i.name == "notes.md" && i.status == InputStatus::Unrecognised));
        // Missing dumps are informational only.
        assert_eq!(report.status, RunStatus::Success);
    }

    #[test]
    fn test_tool_unavailable_falls_back_to_text() {
        let run = RunContext::new(RunMode::Full);
        let inputs = RunInputs::new()
            .with_dump("ovs-vsctl_show", SHOW)
            .with_snapshot(Box::new(UnavailableTool));
        let report = engine().run(&run, inputs).unwrap();

        assert!(report.database.is_unavailable());
        assert!(report.topology.is_available());
        assert_eq!(report.diagnostics.count(DiagnosticKind::ToolUnavailable), 1);
        assert_eq!(report.status, RunStatus::Warnings);
    }

    #[test]
    fn test_query_timeout_stops_snapshot_stage() {
        let calls = Arc::new(AtomicUsize::new(0));
        let run = RunContext::new(RunMode::Full);
        let inputs = RunInputs::new()
            .with_dump("ovs-vsctl_show", SHOW)
            .with_snapshot(Box::new(HungTool {
                calls: calls.clone(),
            }));
        let report = engine().run(&run, inputs).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(report.database.is_unavailable());
        assert!(report.topology.is_available());
        assert_eq!(report.diagnostics.count(DiagnosticKind::QueryError), 1);
        assert_eq!(report.status, RunStatus::Warnings);
    }

    #[test]
    fn test_no_sources_is_fatal() {
        let run = RunContext::new(RunMode::Full);
        let inputs = RunInputs::new()
            .with_dump("README", "nothing here")
            .with_snapshot(Box::new(UnavailableTool));
        let err = engine().run(&run, inputs).unwrap_err();
        assert!(matches!(err, DiagError::NoSources { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cancelled_run_discards_results() {
        let run = RunContext::new(RunMode::TextOnly);
        run.cancel();
        let inputs = RunInputs::new().with_dump("ovs-vsctl_show", SHOW);
        let err = engine().run(&run, inputs).unwrap_err();
        assert!(matches!(err, DiagError::Cancelled { .. }));
    }

    #[test]
    fn test_database_only_ignores_dumps() {
        let snapshot = StaticSnapshot::default().with_table(
            "Bridge",
            vec![serde_json::from_value(json!({"_uuid": ["uuid", "b1"], "name": "br-ex"})).unwrap()],
        );
        let run = RunContext::new(RunMode::DatabaseOnly);
        let inputs = RunInputs::new()
            .with_dump("ovs-vsctl_show", SHOW)
            .with_snapshot(Box::new(snapshot));
        let report = engine().run(&run, inputs).unwrap();

        let topology = report.topology.data().unwrap();
        assert!(topology.graph.bridges.contains_key("br-ex"));
        assert!(!topology.graph.bridges.contains_key("br-int"));
        assert!(report.inputs.iter().any(|i| i.status == InputStatus::Skipped));
        assert_eq!(report.database.data().unwrap().tables["Bridge"], 1);
    }

    #[test]
    fn test_raw_query_mode() {
        let snapshot = StaticSnapshot::default().with_table(
            "Bridge",
            vec![serde_json::from_value(json!({"name": "br-int"})).unwrap()],
        );
        let run = RunContext::new(RunMode::RawQuery);
        let inputs = RunInputs::new()
            .with_snapshot(Box::new(snapshot))
            .with_raw_query(r#"["Open_vSwitch", {"op": "select", "table": "Bridge", "where": []}]"#);
        let report = engine().run(&run, inputs).unwrap();
        let reply = report.raw_query.as_ref().unwrap();
        assert_eq!(reply[0]["rows"][0]["name"], "br-int");
        assert_eq!(report.status, RunStatus::Success);
        assert!(matches!(report.topology, Section::Omitted { .. }));
    }

    #[test]
    fn test_invalid_pod_pattern_rejected() {
        let config = EngineConfig {
            pod_name_patterns: vec!["^(?P<name>.+)$".to_string()],
            ..EngineConfig::default()
        };
        assert!(Engine::new(config).is_err());
    }
}
