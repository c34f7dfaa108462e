//! `ovs-appctl upcall/show` parser, reduced to datapath flow capacity.
//!
//! ```text
//! system@ovs-system:
//!   flows         : (current 155) (avg 150) (max 437) (limit 200000)
//! ```
//!
//! `limit` is the configured maximum, `max` the high-water mark. Captures
//! written by hand may use `current=N` / `limit=N` lines instead.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::model::{CapacityRecord, Record};

use super::tokenize::{parse_u64, split_key_value};
use super::{numbered_lines, DumpInput, ParseOutput};

lazy_static! {
    static ref DATAPATH_LINE: Regex = Regex::new(r"^(\S+@\S+):$").unwrap();
    static ref FLOWS_LINE: Regex = Regex::new(r"^flows\s*:\s*(.*)$").unwrap();
    static ref FLOW_FIELD: Regex = Regex::new(r"\((\w+)\s+([^)\s]+)\)").unwrap();
    static ref HANDLER_LINE: Regex = Regex::new(r"^\d+:\s*\(keys\s+\d+\)$").unwrap();
}

fn empty(datapath: Option<String>) -> CapacityRecord {
    CapacityRecord {
        datapath,
        current: None,
        max: None,
        average: None,
        peak: None,
    }
}

fn has_data(record: &CapacityRecord) -> bool {
    record.current.is_some() || record.max.is_some() || record.average.is_some() || record.peak.is_some()
}

/// Store one named figure. Returns false for names this report does not carry.
fn set_field(record: &mut CapacityRecord, name: &str, value: u64) -> bool {
    match name {
        "current" => record.current = Some(value),
        "limit" | "flow-limit" | "flow_limit" => record.max = Some(value),
        "avg" | "average" => record.average = Some(value),
        "max" | "peak" => record.peak = Some(value),
        _ => return false,
    }
    true
}

pub fn parse(input: &DumpInput<'_>) -> Result<ParseOutput> {
    let mut out = ParseOutput::default();
    let mut current = empty(None);

    for (line_no, line) in numbered_lines(input.content) {
        let trimmed = line.trim();
        out.lines_seen += 1;

        if let Some(caps) = DATAPATH_LINE.captures(trimmed) {
            let finished = std::mem::replace(&mut current, empty(Some(caps[1].to_string())));
            if has_data(&finished) {
                out.push(Record::Capacity(finished));
            }
            continue;
        }

        if let Some(caps) = FLOWS_LINE.captures(trimmed) {
            let mut matched = false;
            for field in FLOW_FIELD.captures_iter(&caps[1]) {
                match parse_u64(&field[2]) {
                    Some(v) => matched |= set_field(&mut current, &field[1], v),
                    None => {
                        out.reject(input.name, line_no, format!("invalid {} {:?}", &field[1], &field[2]));
                        matched = true;
                        break;
                    }
                }
            }
            if !matched {
                out.reject(input.name, line_no, "flows line without figures");
            }
            continue;
        }

        if let Some((key, value)) = split_key_value(trimmed, '=') {
            let key = key.to_ascii_lowercase();
            match parse_u64(value) {
                Some(v) => {
                    set_field(&mut current, &key, v);
                }
                None => out.reject(input.name, line_no, format!("invalid {} {:?}", key, value)),
            }
            continue;
        }

        // Other upcall/show lines (dump duration, ufid, handler keys) are known noise.
        if HANDLER_LINE.is_match(trimmed) || split_key_value(trimmed, ':').is_some() {
            continue;
        }
        out.reject(input.name, line_no, format!("unrecognised capacity line {:?}", trimmed));
    }

    if has_data(&current) {
        out.push(Record::Capacity(current));
    }

    Ok(out)
}
