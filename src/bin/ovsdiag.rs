//! ovsdiag: offline Open vSwitch diagnostics over a capture directory
//!
//! Prints the JSON report on stdout. Exit status: 0 success, 2 completed
//! with warnings, 1 fatal.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use ovsdiag_core::config::{ENV_OVSDB_TOOL, ENV_QUERY_TIMEOUT, ENV_TOP_N, ENV_WINDOW};
use ovsdiag_core::logging::init_logger;
use ovsdiag_core::report::{fatal_report, render_compact, render_json};
use ovsdiag_core::{Engine, EngineConfig, RunContext, RunInputs, RunMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Full,
    Db,
    Text,
}

/// ovsdiag: offline Open vSwitch state correlation and diagnostics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Capture directory holding the dumps (and optionally conf.db)
    capture_dir: PathBuf,

    /// Which sources to analyze
    #[arg(long, value_enum, default_value = "full")]
    mode: ModeArg,

    /// Database snapshot path; overrides conf.db / conf.db.json in the capture
    #[arg(long)]
    db: Option<PathBuf>,

    /// Forward this OVSDB transaction to the snapshot and print the reply
    #[arg(long)]
    query: Option<String>,

    /// JSON engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Coverage observation window in seconds
    #[arg(long, env = ENV_WINDOW)]
    window: Option<f64>,

    /// Flows kept per bridge in the hit ranking
    #[arg(long, env = ENV_TOP_N)]
    top_n: Option<usize>,

    /// Bound on one database query, in seconds
    #[arg(long, env = ENV_QUERY_TIMEOUT)]
    query_timeout: Option<u64>,

    /// Path of the ovsdb-tool executable
    #[arg(long, env = ENV_OVSDB_TOOL)]
    ovsdb_tool: Option<String>,

    /// Extra interface-name pattern for pod mapping (regex with a `pod` capture)
    #[arg(long = "pod-pattern")]
    pod_patterns: Vec<String>,

    /// Parse and analyze on a single thread
    #[arg(long)]
    sequential: bool,

    /// Print single-line JSON
    #[arg(long)]
    compact: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "OVSDIAG_LOG_LEVEL")]
    log_level: String,
}

impl Args {
    fn run_mode(&self) -> RunMode {
        if self.query.is_some() {
            return RunMode::RawQuery;
        }
        match self.mode {
            ModeArg::Full => RunMode::Full,
            ModeArg::Db => RunMode::DatabaseOnly,
            ModeArg::Text => RunMode::TextOnly,
        }
    }

    /// Defaults, then the config file, then environment, then flags.
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                EngineConfig::from_json_str(&json)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        // clap already folded the OVSDIAG_* variables into the flags below.
        if let Some(window) = self.window {
            config.observation_window_secs = Some(window);
        }
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(timeout) = self.query_timeout {
            config.query_timeout_secs = timeout;
        }
        if let Some(tool) = &self.ovsdb_tool {
            config.ovsdb_tool = tool.clone();
        }
        config.pod_name_patterns.extend(self.pod_patterns.iter().cloned());
        if self.sequential {
            config.parallel = false;
        }
        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level.parse().unwrap_or(log::LevelFilter::Info));

    match execute(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("RUN_FAILED error={:#}", e);
            eprintln!("ovsdiag: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn execute(args: &Args) -> Result<u8> {
    let config = args.engine_config()?;
    let mut inputs = RunInputs::load_dir(&args.capture_dir, args.db.as_deref(), &config)
        .with_context(|| format!("Failed to load capture {}", args.capture_dir.display()))?;
    inputs.raw_query = args.query.clone();

    let engine = Engine::new(config).context("Failed to configure engine")?;
    let run = RunContext::new(args.run_mode());

    let report = match engine.run(&run, inputs) {
        Ok(report) => report,
        Err(e) => fatal_report(&run, &e),
    };

    let rendered = if args.compact {
        render_compact(&report)
    } else {
        render_json(&report)
    };
    println!("{}", rendered);

    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}
