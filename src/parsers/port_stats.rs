//! `ovs-ofctl dump-ports <bridge>` parser.
//!
//! ```text
//!   port  1: rx pkts=120, bytes=10080, drop=0, errs=0, frame=0, over=0, crc=0
//!            tx pkts=98, bytes=8232, drop=?, errs=0, coll=0
//!            duration=3021.5s
//! ```
//!
//! A `?` counter is untracked by the datapath and reads as zero with the raw
//! text kept. A negative counter invalidates the whole port record.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{Attributes, PortStatRecord, Record};
use crate::error::Result;

use super::tokenize::{parse_counter, split_key_value, split_top_level, unquote, Counter};
use super::{numbered_lines, DumpInput, ParseOutput};

lazy_static! {
    static ref PORT_LINE: Regex = Regex::new(r"^port\s+(.+?):\s*rx\s+(.*)$").unwrap();
    static ref TX_LINE: Regex = Regex::new(r"^tx\s+(.*)$").unwrap();
}

#[derive(Debug)]
struct Pending {
    line: usize,
    record: PortStatRecord,
    /// First reason the record is unusable, if any.
    invalid: Option<String>,
}

#[derive(Clone, Copy)]
enum Direction {
    Rx,
    Tx,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Rx => "rx",
            Direction::Tx => "tx",
        }
    }
}

pub fn parse(input: &DumpInput<'_>) -> Result<ParseOutput> {
    let bridge = input.kind.bridge().map(str::to_string);
    let mut out = ParseOutput::default();
    let mut pending: Option<Pending> = None;

    for (line_no, line) in numbered_lines(input.content) {
        let trimmed = line.trim();
        if trimmed.starts_with("OFPST_PORT") || trimmed.starts_with("NXST_PORT") {
            continue;
        }
        out.lines_seen += 1;

        if let Some(caps) = PORT_LINE.captures(trimmed) {
            flush(input.name, pending.take(), &mut out);
            let mut record = PortStatRecord {
                bridge: bridge.clone(),
                port: unquote(&caps[1]),
                rx_packets: 0,
                rx_drops: 0,
                rx_errors: 0,
                tx_packets: 0,
                tx_drops: 0,
                tx_errors: 0,
                extra: Attributes::new(),
            };
            let invalid = apply_counters(&mut record, Direction::Rx, &caps[2]).err();
            pending = Some(Pending {
                line: line_no,
                record,
                invalid,
            });
            continue;
        }

        let Some(current) = pending.as_mut() else {
            out.reject(input.name, line_no, "counters outside a port block");
            continue;
        };

        if let Some(caps) = TX_LINE.captures(trimmed) {
            if let Err(reason) = apply_counters(&mut current.record, Direction::Tx, &caps[1]) {
                current.invalid.get_or_insert(reason);
            }
        } else if let Some(value) = trimmed.strip_prefix("duration=") {
            current
                .record
                .extra
                .insert("duration".to_string(), value.to_string());
        } else {
            out.reject(input.name, line_no, format!("unrecognised port statistics line {:?}", trimmed));
        }
    }
    flush(input.name, pending.take(), &mut out);

    Ok(out)
}

fn flush(source: &str, pending: Option<Pending>, out: &mut ParseOutput) {
    let Some(pending) = pending else {
        return;
    };
    match pending.invalid {
        Some(reason) => out.reject(
            source,
            pending.line,
            format!("port {}: {}", pending.record.port, reason),
        ),
        None => out.push(Record::PortStat(pending.record)),
    }
}

fn apply_counters(
    record: &mut PortStatRecord,
    direction: Direction,
    text: &str,
) -> std::result::Result<(), String> {
    let mut failure = None;
    for token in split_top_level(text, ',') {
        let Some((key, raw)) = split_key_value(token, '=') else {
            continue;
        };
        let label = format!("{}_{}", direction.prefix(), key);
        let value = match parse_counter(raw) {
            Counter::Value(v) => v,
            Counter::Unsupported => {
                record.extra.insert(label.clone(), raw.to_string());
                0
            }
            Counter::Negative(v) => {
                failure.get_or_insert_with(|| format!("negative counter {}={}", label, v));
                continue;
            }
            Counter::Invalid => {
                failure.get_or_insert_with(|| format!("invalid counter {}={:?}", label, raw));
                continue;
            }
        };
        match (direction, key) {
            (Direction::Rx, "pkts") => record.rx_packets = value,
            (Direction::Rx, "drop") => record.rx_drops = value,
            (Direction::Rx, "errs") => record.rx_errors = value,
            (Direction::Tx, "pkts") => record.tx_packets = value,
            (Direction::Tx, "drop") => record.tx_drops = value,
            (Direction::Tx, "errs") => record.tx_errors = value,
            _ => {
                record.extra.entry(label).or_insert_with(|| value.to_string());
            }
        }
    }
    match failure {
        Some(reason) => Err(reason),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::DumpKind;

    const DUMP: &str = r#"OFPST_PORT reply (xid=0x2): 3 ports
  port LOCAL: rx pkts=0, bytes=0, drop=0, errs=0, frame=0, over=0, crc=0
           tx pkts=0, bytes=0, drop=0, errs=0, coll=0
  port  1: rx pkts=120, bytes=10080, drop=3, errs=0, frame=0, over=0, crc=0
           tx pkts=98, bytes=8232, drop=?, errs=2, coll=0
           duration=3021.5s
  port  "veth1": rx pkts=5, bytes=300, drop=0, errs=0, frame=0, over=0, crc=0
           tx pkts=5, bytes=300, drop=0, errs=0, coll=0
"#;

    fn run(content: &str) -> ParseOutput {
        let kind = DumpKind::PortStats("br-int".to_string());
        parse(&DumpInput {
            name: "ovs-ofctl_dump-ports_br-int",
            kind: &kind,
            content,
        })
        .unwrap()
    }

    fn stats(out: &ParseOutput) -> Vec<&PortStatRecord> {
        out.records
            .iter()
            .filter_map(|r| match r {
                Record::PortStat(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_dump() {
        let out = run(DUMP);
        assert!(out.issues.is_empty(), "{:?}", out.issues);
        let stats = stats(&out);
        assert_eq!(stats.len(), 3);

        assert_eq!(stats[0].port, "LOCAL");
        assert_eq!(stats[1].port, "1");
        assert_eq!(stats[1].rx_packets, 120);
        assert_eq!(stats[1].rx_drops, 3);
        assert_eq!(stats[1].tx_drops, 0);
        assert_eq!(stats[1].tx_errors, 2);
        assert_eq!(stats[1].extra.get("tx_drop").map(String::as_str), Some("?"));
        assert_eq!(stats[1].extra.get("duration").map(String::as_str), Some("3021.5s"));
        assert_eq!(stats[1].extra.get("rx_bytes").map(String::as_str), Some("10080"));
        assert_eq!(stats[2].port, "veth1");
        assert_eq!(stats[2].bridge.as_deref(), Some("br-int"));
    }

    #[test]
    fn test_negative_counter_discards_port() {
        let content = "  port  1: rx pkts=1, bytes=0, drop=0, errs=0\n           tx pkts=-4, bytes=0, drop=0, errs=0\n  port  2: rx pkts=1, bytes=0, drop=0, errs=0\n";
        let out = run(content);
        let stats = stats(&out);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].port, "2");
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].line, Some(1));
        assert!(out.issues[0].message.contains("negative"));
    }

    #[test]
    fn test_orphan_tx_line_is_rejected() {
        let out = run("           tx pkts=1, bytes=0, drop=0, errs=0\n");
        assert!(stats(&out).is_empty());
        assert!(out.is_unrecognised());
    }
}
