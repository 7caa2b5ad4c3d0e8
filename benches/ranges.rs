//! Benchmarks for range expansion and report ingestion

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nmapflow::{
    parser::XmlParser,
    utils::{parse_ports, ports_to_str, targets_to_list},
};

/// Benchmark port specification parsing and rendering
fn bench_ports(c: &mut Criterion) {
    let mut group = c.benchmark_group("ports");

    group.bench_function("parse_mixed", |b| {
        b.iter(|| {
            parse_ports(black_box(
                "21-23,25,53,80,110-111,135,139,143,443,445,993,995,1723,3306,3389,5900,8080",
            ))
        })
    });

    group.bench_function("parse_full_range", |b| {
        b.iter(|| parse_ports(black_box("1-65535")))
    });

    let every_other: Vec<u16> = (1..=65535).step_by(2).collect();
    group.bench_function("render_fragmented", |b| {
        b.iter(|| ports_to_str(black_box(&every_other)))
    });

    group.finish();
}

/// Benchmark target expansion for growing CIDR blocks
fn bench_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("targets");

    for prefix in [24u8, 20, 16] {
        let spec = format!("10.0.0.0/{}", prefix);
        group.bench_with_input(BenchmarkId::new("cidr", prefix), &spec, |b, spec| {
            b.iter(|| targets_to_list(black_box(spec)))
        });
    }

    group.bench_function("partial_octets", |b| {
        b.iter(|| targets_to_list(black_box("10.0-15.0-15.1-254")))
    });

    group.finish();
}

/// Benchmark XML ingestion of the test fixture
fn bench_ingestion(c: &mut Criterion) {
    let xml = include_str!("../tests/fixtures/scan.xml");
    let parser = XmlParser::new();

    c.bench_function("parse_fixture_report", |b| {
        b.iter(|| parser.parse_str(black_box(xml)))
    });
}

criterion_group!(benches, bench_ports, bench_targets, bench_ingestion);
criterion_main!(benches);
