//! `ovs-ofctl dump-flows <bridge>` parser.
//!
//! Each rule prints as `<stats>, priority=N,<match> actions=<actions>`.
//! Statistics keys come first; the first non-statistic token starts the
//! match. A rule with no explicit priority has the OpenFlow default.

use crate::error::Result;
use crate::model::{Attributes, FlowRecord, Record};

use super::tokenize::{parse_seconds, parse_u64, split_key_value, split_top_level};
use super::{numbered_lines, DumpInput, ParseOutput};

pub const DEFAULT_PRIORITY: u16 = 32768;

const STAT_KEYS: &[&str] = &[
    "cookie",
    "duration",
    "table",
    "n_packets",
    "n_bytes",
    "idle_age",
    "hard_age",
    "idle_timeout",
    "hard_timeout",
    "importance",
];

const STAT_FLAGS: &[&str] = &[
    "send_flow_rem",
    "check_overlap",
    "reset_counts",
    "no_packet_counts",
    "no_byte_counts",
];

pub fn parse(input: &DumpInput<'_>) -> Result<ParseOutput> {
    let bridge = input.kind.bridge().map(str::to_string);
    let mut out = ParseOutput::default();

    for (line_no, line) in numbered_lines(input.content) {
        let trimmed = line.trim();
        if is_reply_header(trimmed) {
            continue;
        }
        out.lines_seen += 1;
        match parse_flow_line(trimmed) {
            Ok(mut flow) => {
                flow.bridge = bridge.clone();
                out.push(Record::Flow(flow));
            }
            Err(reason) => out.reject(input.name, line_no, reason),
        }
    }

    Ok(out)
}

fn is_reply_header(line: &str) -> bool {
    (line.starts_with("NXST_FLOW") || line.starts_with("OFPST_FLOW")) && line.contains("reply")
}

/// Parse one rule line. Returns the rejection reason on failure.
pub fn parse_flow_line(line: &str) -> std::result::Result<FlowRecord, String> {
    let (head, actions) = split_actions(line).ok_or("missing actions")?;

    let mut flow = FlowRecord {
        bridge: None,
        table: 0,
        priority: DEFAULT_PRIORITY,
        match_expr: String::new(),
        actions: actions.trim().to_string(),
        packet_count: 0,
        byte_count: 0,
        cookie: None,
        duration_secs: None,
        extra: Attributes::new(),
    };

    let tokens: Vec<&str> = split_top_level(head, ',')
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    let mut idx = 0;
    while idx < tokens.len() {
        let token = tokens[idx];
        if STAT_FLAGS.contains(&token) {
            flow.extra.insert(token.to_string(), "true".to_string());
            idx += 1;
            continue;
        }
        let Some((key, value)) = split_key_value(token, '=') else {
            break;
        };
        if !STAT_KEYS.contains(&key) {
            break;
        }
        apply_stat(&mut flow, key, value)?;
        idx += 1;
    }

    let mut match_tokens = &tokens[idx..];
    if let Some(first) = match_tokens.first() {
        if let Some(value) = first.strip_prefix("priority=") {
            flow.priority = value
                .trim()
                .parse()
                .map_err(|_| format!("invalid priority {:?}", value))?;
            match_tokens = &match_tokens[1..];
        }
    }
    flow.match_expr = match_tokens.join(",");

    Ok(flow)
}

/// Split at the ` actions=` keyword outside quotes and brackets.
fn split_actions(line: &str) -> Option<(&str, &str)> {
    if let Some(rest) = line.strip_prefix("actions=") {
        return Some(("", rest));
    }
    let pos = line
        .match_indices("actions=")
        .map(|(pos, _)| pos)
        .find(|&pos| {
            matches!(line[..pos].chars().last(), Some(' ') | Some(','))
                && balanced(&line[..pos])
        })?;
    Some((line[..pos].trim_end_matches([' ', ',']), &line[pos + "actions=".len()..]))
}

fn balanced(prefix: &str) -> bool {
    let opens = prefix.matches(['(', '[', '{']).count();
    let closes = prefix.matches([')', ']', '}']).count();
    opens == closes && prefix.matches('"').count() % 2 == 0
}

fn apply_stat(flow: &mut FlowRecord, key: &str, value: &str) -> std::result::Result<(), String> {
    let counter = |v: &str| -> std::result::Result<u64, String> {
        if v.trim_start().starts_with('-') {
            return Err(format!("negative {} {:?}", key, v));
        }
        parse_u64(v).ok_or_else(|| format!("invalid {} {:?}", key, v))
    };
    match key {
        "n_packets" => flow.packet_count = counter(value)?,
        "n_bytes" => flow.byte_count = counter(value)?,
        "table" => {
            flow.table = value
                .parse()
                .map_err(|_| format!("invalid table {:?}", value))?;
        }
        "cookie" => flow.cookie = Some(value.to_string()),
        "duration" => {
            flow.duration_secs =
                Some(parse_seconds(value).ok_or_else(|| format!("invalid duration {:?}", value))?);
        }
        _ => {
            flow.extra.insert(key.to_string(), value.to_string());
        }
    }
    Ok(())
}
