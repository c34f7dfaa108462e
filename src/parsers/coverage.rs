//! `ovs-appctl coverage/show` parser.
//!
//! Counter lines carry three averaged rates and a lifetime total. The dump
//! itself says nothing about how long the totals accumulated; a capture may
//! add `uptime: N`, `window: N` or `observation_window=N` (seconds) and
//! that window is stamped onto every record.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::Result;
use crate::model::{Attributes, CoverageRecord, Record};

use super::tokenize::{parse_seconds, parse_u64};
use super::{numbered_lines, DumpInput, ParseOutput};

lazy_static! {
    static ref COUNTER_LINE: Regex = Regex::new(
        r"^(\S+)\s+([\d.]+)/sec\s+([\d.]+)/sec\s+([\d.]+)/sec\s+total:\s*(\S+)$"
    )
    .unwrap();
    static ref WINDOW_LINE: Regex =
        Regex::new(r"^(?i)(?:uptime|window|observation_window)\s*[:=]\s*(\S+)$").unwrap();
    static ref NEVER_HIT: Regex = Regex::new(r"^\d+ events never hit$").unwrap();
}

const RATE_LABELS: [&str; 3] = ["rate_5s", "rate_1m", "rate_1h"];

pub fn parse(input: &DumpInput<'_>) -> Result<ParseOutput> {
    let mut out = ParseOutput::default();
    let mut window: Option<f64> = None;

    for (line_no, line) in numbered_lines(input.content) {
        let trimmed = line.trim();
        if trimmed.starts_with("Event coverage") || NEVER_HIT.is_match(trimmed) {
            continue;
        }
        out.lines_seen += 1;

        if let Some(caps) = WINDOW_LINE.captures(trimmed) {
            match parse_seconds(&caps[1]).filter(|w| *w > 0.0) {
                Some(secs) => window = Some(secs),
                None => out.reject(input.name, line_no, format!("invalid observation window {:?}", &caps[1])),
            }
            continue;
        }

        let Some(caps) = COUNTER_LINE.captures(trimmed) else {
            out.reject(input.name, line_no, format!("unrecognised coverage line {:?}", trimmed));
            continue;
        };
        let Some(total) = parse_u64(&caps[5]) else {
            out.reject(input.name, line_no, format!("invalid total {:?}", &caps[5]));
            continue;
        };
        let extra: Attributes = RATE_LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| (label.to_string(), caps[i + 2].to_string()))
            .collect();
        out.push(Record::Coverage(CoverageRecord {
            name: caps[1].to_string(),
            total,
            window_secs: None,
            extra,
        }));
    }

    if window.is_some() {
        for record in &mut out.records {
            if let Record::Coverage(c) = record {
                c.window_secs = window;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::DumpKind;

    const DUMP: &str = "Event coverage, avg rate over last: 5 seconds, last minute, last hour,  hash=6fe4a7b4:
bridge_reconfigure         0.0/sec     0.000/sec        0.0000/sec   total: 12
datapath_drop_upcall_error 0.2/sec     0.150/sec        0.0100/sec   total: 360
netdev_get_stats           1.2/sec     1.150/sec        1.1000/sec   total: 4021
82 events never hit
";

    fn run(content: &str) -> ParseOutput {
        let kind = DumpKind::Coverage;
        parse(&DumpInput {
            name: "ovs-appctl_coverage.show",
            kind: &kind,
            content,
        })
        .unwrap()
    }

    fn records(out: &ParseOutput) -> Vec<&CoverageRecord> {
        out.records
            .iter()
            .filter_map(|r| match r {
                Record::Coverage(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_counters_without_window() {
        let out = run(DUMP);
        assert!(out.issues.is_empty(), "{:?}", out.issues);
        let records = records(&out);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].name, "datapath_drop_upcall_error");
        assert_eq!(records[1].total, 360);
        assert_eq!(records[1].window_secs, None);
        assert_eq!(records[1].extra.get("rate_1m").map(String::as_str), Some("0.150"));
    }

    #[test]
    fn test_window_applies_to_every_counter() {
        let content = format!("{}uptime: 3600\n", DUMP);
        let out = run(&content);
        assert!(records(&out).iter().all(|r| r.window_secs == Some(3600.0)));
    }

    #[test]
    fn test_bad_total_is_rejected() {
        let out = run("foo 0.0/sec 0.0/sec 0.0/sec total: -1\n");
        assert!(out.is_unrecognised());
    }
}
