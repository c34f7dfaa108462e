//! Flow-dump parsing throughput.
//!
//! Captured br-int dumps on busy OVN nodes run to hundreds of thousands of
//! lines; parsing them dominates a run.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use ovsdiag_core::parsers::flows::{parse, parse_flow_line};
use ovsdiag_core::parsers::{DumpInput, DumpKind};

fn synthetic_dump(lines: usize) -> String {
    let mut dump = String::from("NXST_FLOW reply (xid=0x4):\n");
    for i in 0..lines {
        let table = i % 40;
        let actions = if i % 17 == 0 {
            "drop".to_string()
        } else {
            format!("load:0x{:x}->NXM_NX_REG14[],resubmit(,{})", i, table + 1)
        };
        dump.push_str(&format!(
            " cookie=0x{:x}, duration=9321.{}s, table={}, n_packets={}, n_bytes={}, idle_age={}, priority={},reg14=0x{:x},metadata=0x{:x},dl_src=0a:58:0a:80:{:02x}:{:02x} actions={}\n",
            i * 31,
            i % 1000,
            table,
            i * 7,
            i * 448,
            i % 600,
            100 + (i % 50),
            i % 256,
            i % 64,
            (i >> 8) & 0xff,
            i & 0xff,
            actions
        ));
    }
    dump
}

fn bench_flow_line(c: &mut Criterion) {
    let line = " cookie=0x8b2e4c1d, duration=9321.511s, table=44, n_packets=91234, n_bytes=7663656, idle_age=0, priority=2002,ct_state=+new-est+trk,ip,reg15=0x5,metadata=0x3,nw_src=10.244.1.0/24 actions=ct(commit,zone=NXM_NX_REG13[0..15],exec(load:0x1->NXM_NX_CT_LABEL[1])),resubmit(,45)";
    c.bench_function("flow_line_ovn_acl", |b| {
        b.iter(|| black_box(parse_flow_line(black_box(line))))
    });
}

fn bench_flow_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow_dump");
    let kind = DumpKind::Flows("br-int".to_string());

    for lines in [1_000usize, 10_000, 100_000] {
        let dump = synthetic_dump(lines);
        group.throughput(Throughput::Bytes(dump.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &dump, |b, dump| {
            b.iter(|| {
                let input = DumpInput {
                    name: "ovs-ofctl_dump-flows_br-int",
                    kind: &kind,
                    content: dump,
                };
                black_box(parse(&input))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_flow_line, bench_flow_dump);
criterion_main!(benches);
