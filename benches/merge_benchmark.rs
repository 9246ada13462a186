//! Benchmarks for range aggregation and CIDR normalization.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nchnroutes::merge::{aggregate, aggregate_and_normalize};
use nchnroutes::range::{AddressFamily, IpRange};

/// Generate sorted /24 ranges with a gap every eighth block, which
/// keeps the aggregator busy without letting everything collapse into
/// one interval.
fn generate_ranges(count: usize) -> Vec<IpRange> {
    (0..count)
        .map(|i| {
            let block = i + i / 8;
            IpRange::from_prefix(
                AddressFamily::V4,
                (block as u128) << 8,
                24,
                vec!["USA".to_string()],
            )
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for size in [1_000, 10_000, 100_000] {
        let ranges = generate_ranges(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ranges, |b, ranges| {
            b.iter(|| aggregate(black_box(ranges)));
        });
    }

    group.finish();
}

fn bench_aggregate_and_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_and_normalize");

    for size in [1_000, 10_000, 100_000] {
        let ranges = generate_ranges(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ranges, |b, ranges| {
            b.iter(|| aggregate_and_normalize(black_box(ranges), AddressFamily::V4));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_aggregate_and_normalize);
criterion_main!(benches);
