//! Record parsers.
//!
//! One parser per captured command output, dispatched through a flat table
//! keyed by dump kind. The kind is chosen from the file name, never by
//! sniffing content. Every parser skips malformed lines with a diagnostic
//! and keeps going; only an input that is entirely unrecognisable fails, and
//! then only for that one parser.

pub mod capacity;
pub mod coverage;
pub mod flows;
pub mod port_stats;
pub mod snapshot;
pub mod table_list;
pub mod tokenize;
pub mod topology_show;
pub mod tunnels;

use std::fmt;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DiagError, Diagnostic, Result};
use crate::logging::structured::LogContext;
use crate::model::Record;

lazy_static! {
    static ref SHOW_NAME: Regex = Regex::new(r"(?i)^ovs-vsctl.*[_ ]show$").unwrap();
    static ref LIST_NAME: Regex =
        Regex::new(r"(?i)^ovs-vsctl.*[_ ]list[_ ]+(bridge|port|interface|open_vswitch)$").unwrap();
    static ref FLOWS_NAME: Regex = Regex::new(r"(?i)^ovs-ofctl.*[_ ]dump-flows[_ ]+(.+)$").unwrap();
    static ref PORTS_NAME: Regex = Regex::new(r"(?i)^ovs-ofctl.*[_ ]dump-ports[_ ]+(.+)$").unwrap();
    static ref TUNNELS_NAME: Regex = Regex::new(r"(?i)dpif[._/ ]show$").unwrap();
    static ref COVERAGE_NAME: Regex = Regex::new(r"(?i)coverage[._/ ]show$").unwrap();
    static ref CAPACITY_NAME: Regex = Regex::new(r"(?i)upcall[._/ ]show$").unwrap();
}

/// Extensions capture tools append to command output files.
const IGNORED_EXTENSIONS: &[&str] = &[".txt", ".out", ".log"];

/// Known dump kinds. Per-bridge dumps carry the bridge named in the file name;
/// table listings carry the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum DumpKind {
    TopologyShow,
    TableList(String),
    Flows(String),
    PortStats(String),
    Tunnels,
    Coverage,
    Capacity,
}

/// Dispatch key: a dump kind without its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpTag {
    TopologyShow,
    TableList,
    Flows,
    PortStats,
    Tunnels,
    Coverage,
    Capacity,
}

impl DumpTag {
    pub const ALL: [DumpTag; 7] = [
        DumpTag::TopologyShow,
        DumpTag::TableList,
        DumpTag::Flows,
        DumpTag::PortStats,
        DumpTag::Tunnels,
        DumpTag::Coverage,
        DumpTag::Capacity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DumpTag::TopologyShow => "topology_show",
            DumpTag::TableList => "table_list",
            DumpTag::Flows => "flows",
            DumpTag::PortStats => "port_stats",
            DumpTag::Tunnels => "tunnels",
            DumpTag::Coverage => "coverage",
            DumpTag::Capacity => "capacity",
        }
    }
}

impl fmt::Display for DumpTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DumpKind {
    /// Classify a capture file by its name. Matching is case-insensitive; the
    /// bridge name keeps its original case.
    ///
    /// ```
    /// use ovsdiag_core::parsers::DumpKind;
    /// assert_eq!(
    ///     DumpKind::from_file_name("ovs-ofctl_-O_OpenFlow13_dump-flows_br-int"),
    ///     Some(DumpKind::Flows("br-int".to_string()))
    /// );
    /// assert_eq!(DumpKind::from_file_name("ovs-ofctl_dump-ports-desc_br-int"), None);
    /// ```
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name)
            .trim();
        let lowered = base.to_ascii_lowercase();
        let name = IGNORED_EXTENSIONS
            .iter()
            .find(|ext| lowered.ends_with(*ext))
            .map(|ext| &base[..base.len() - ext.len()])
            .unwrap_or(base);

        if let Some(caps) = FLOWS_NAME.captures(name) {
            return bridge_target(&caps[1]).map(DumpKind::Flows);
        }
        if let Some(caps) = PORTS_NAME.captures(name) {
            return bridge_target(&caps[1]).map(DumpKind::PortStats);
        }
        if let Some(caps) = LIST_NAME.captures(name) {
            return Some(DumpKind::TableList(caps[1].to_ascii_lowercase()));
        }
        if SHOW_NAME.is_match(name) {
            return Some(DumpKind::TopologyShow);
        }
        if TUNNELS_NAME.is_match(name) {
            return Some(DumpKind::Tunnels);
        }
        if COVERAGE_NAME.is_match(name) {
            return Some(DumpKind::Coverage);
        }
        if CAPACITY_NAME.is_match(name) {
            return Some(DumpKind::Capacity);
        }
        None
    }

    pub fn tag(&self) -> DumpTag {
        match self {
            DumpKind::TopologyShow => DumpTag::TopologyShow,
            DumpKind::TableList(_) => DumpTag::TableList,
            DumpKind::Flows(_) => DumpTag::Flows,
            DumpKind::PortStats(_) => DumpTag::PortStats,
            DumpKind::Tunnels => DumpTag::Tunnels,
            DumpKind::Coverage => DumpTag::Coverage,
            DumpKind::Capacity => DumpTag::Capacity,
        }
    }

    /// Bridge named by a per-bridge dump.
    pub fn bridge(&self) -> Option<&str> {
        match self {
            DumpKind::Flows(b) | DumpKind::PortStats(b) => Some(b.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for DumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpKind::TableList(t) | DumpKind::Flows(t) | DumpKind::PortStats(t) => {
                write!(f, "{}({})", self.tag(), t)
            }
            _ => write!(f, "{}", self.tag()),
        }
    }
}

/// Strip leading command options (`-O_OpenFlow13_`, `--names_`) from the part
/// of a file name after the subcommand.
fn bridge_target(rest: &str) -> Option<String> {
    let mut rest = rest.trim();
    while rest.starts_with('-') {
        let cut = rest.find(['_', ' '])?;
        rest = rest[cut + 1..].trim_start_matches(['_', ' ']);
        // Options that take a value, e.g. `-O OpenFlow13`.
        if rest.to_ascii_lowercase().starts_with("openflow") {
            let cut = rest.find(['_', ' '])?;
            rest = rest[cut + 1..].trim_start_matches(['_', ' ']);
        }
    }
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

/// One captured text dump, routed to a parser.
#[derive(Debug, Clone, Copy)]
pub struct DumpInput<'a> {
    /// File name, used as the diagnostic source.
    pub name: &'a str,
    pub kind: &'a DumpKind,
    pub content: &'a str,
}

/// Records and issues produced by one parser over one input.
#[derive(Debug, Default, Clone)]
pub struct ParseOutput {
    pub records: Vec<Record>,
    pub issues: Vec<Diagnostic>,
    /// Non-blank lines the parser tried to interpret.
    pub lines_seen: usize,
    /// Lines rejected as malformed.
    pub lines_rejected: usize,
}

impl ParseOutput {
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Record a malformed line and move on.
    pub fn reject(&mut self, source: &str, line: usize, reason: impl Into<String>) {
        self.lines_rejected += 1;
        self.issues
            .push(Diagnostic::malformed_line(source, line, reason));
    }

    /// Whole input rejected: non-blank, nothing parsed, every line refused.
    pub fn is_unrecognised(&self) -> bool {
        self.records.is_empty() && self.lines_seen > 0 && self.lines_rejected >= self.lines_seen
    }
}

/// Parser capability: raw text of one dump kind in, records and issues out.
pub trait Parser: Send + Sync {
    fn parse(&self, input: &DumpInput<'_>) -> Result<ParseOutput>;
}

pub type ParseFn = fn(&DumpInput<'_>) -> Result<ParseOutput>;

impl Parser for ParseFn {
    fn parse(&self, input: &DumpInput<'_>) -> Result<ParseOutput> {
        (*self)(input)
    }
}

/// Dispatch table.
pub const PARSERS: &[(DumpTag, ParseFn)] = &[
    (DumpTag::TopologyShow, topology_show::parse),
    (DumpTag::TableList, table_list::parse),
    (DumpTag::Flows, flows::parse),
    (DumpTag::PortStats, port_stats::parse),
    (DumpTag::Tunnels, tunnels::parse),
    (DumpTag::Coverage, coverage::parse),
    (DumpTag::Capacity, capacity::parse),
];

pub fn parser_for(tag: DumpTag) -> Option<&'static dyn Parser> {
    PARSERS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, f)| f as &'static dyn Parser)
}

/// Parse one dump through the dispatch table.
pub fn parse_dump(input: &DumpInput<'_>, ctx: &LogContext) -> Result<ParseOutput> {
    let ctx = ctx.with_source(input.name);
    let parser = parser_for(input.kind.tag()).ok_or_else(|| DiagError::UnsupportedFormat {
        kind: input.kind.to_string(),
        reason: "no parser registered".to_string(),
    })?;

    let output = parser.parse(input)?;

    if output.is_unrecognised() {
        log::warn!(
            "{} PARSE_UNSUPPORTED_FORMAT kind={} lines={}",
            ctx,
            input.kind,
            output.lines_seen
        );
        return Err(DiagError::UnsupportedFormat {
            kind: input.kind.to_string(),
            reason: format!("none of {} lines matched the expected format", output.lines_seen),
        });
    }

    crate::log_info!(
        ctx,
        "PARSE_COMPLETE",
        kind = input.kind.to_string(),
        records = output.records.len(),
        malformed = output.lines_rejected,
    );

    Ok(output)
}

/// Iterate `(1-based line number, line)` over non-blank lines.
pub(crate) fn numbered_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_file_names() {
        assert_eq!(DumpKind::from_file_name("ovs-vsctl_-t_5_show"), Some(DumpKind::TopologyShow));
        assert_eq!(
            DumpKind::from_file_name("sos_commands/openvswitch/ovs-vsctl_-t_5_list_interface"),
            Some(DumpKind::TableList("interface".to_string()))
        );
        assert_eq!(
            DumpKind::from_file_name("ovs-ofctl_dump-flows_br-int.txt"),
            Some(DumpKind::Flows("br-int".to_string()))
        );
        assert_eq!(
            DumpKind::from_file_name("ovs-ofctl_--names_dump-ports_br-ex"),
            Some(DumpKind::PortStats("br-ex".to_string()))
        );
        assert_eq!(DumpKind::from_file_name("ovs-appctl_dpif.show"), Some(DumpKind::Tunnels));
        assert_eq!(DumpKind::from_file_name("ovs-appctl_coverage.show"), Some(DumpKind::Coverage));
        assert_eq!(DumpKind::from_file_name("ovs-appctl_upcall.show"), Some(DumpKind::Capacity));
        assert_eq!(DumpKind::from_file_name("ovs-ofctl_dump-ports-desc_br-int"), None);
        assert_eq!(DumpKind::from_file_name("journalctl_-u_ovs-vswitchd"), None);
    }

    #[test]
    fn test_bridge_target_strips_options() {
        assert_eq!(bridge_target("-o_openflow13_br-int"), Some("br-int".to_string()));
        assert_eq!(bridge_target("br_ex"), Some("br_ex".to_string()));
        assert_eq!(bridge_target("--names"), None);
    }

    #[test]
    fn test_dispatch_table_covers_every_tag() {
        for tag in DumpTag::ALL {
            assert!(parser_for(tag).is_some(), "no parser for {}", tag);
        }
    }

    #[test]
    fn test_unsupported_format_is_fatal_for_parser() {
        let ctx = LogContext::new("run-test");
        let kind = DumpKind::Flows("br-int".to_string());
        let input = DumpInput {
            name: "ovs-ofctl_dump-flows_br-int",
            kind: &kind,
            content: "this is not\na flow dump at all\n",
        };
        let result = parse_dump(&input, &ctx);
        assert!(matches!(result, Err(DiagError::UnsupportedFormat { .. })));
    }
}
