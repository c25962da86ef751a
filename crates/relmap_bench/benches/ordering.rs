//! Graph expansion and dependency ordering benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relmap_bench::utils::{node, self_ref_metadata, MapLinks};
use relmap_core::{expand, order, Direction};

/// Benchmark expansion over chains of increasing depth.
fn bench_expand_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_chain");

    for size in [10i64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let metadata = self_ref_metadata(false);
            let links = MapLinks::chain(size);
            let roots = vec![node(0)];

            b.iter(|| {
                let graph = expand(black_box(&roots), Direction::Insert, &metadata, &links);
                black_box(graph.node_count());
            });
        });
    }
    group.finish();
}

/// Benchmark expansion over wide fans.
fn bench_expand_fan(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_fan");

    for size in [10i64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let metadata = self_ref_metadata(false);
            let links = MapLinks::fan(size);
            let roots = vec![node(0)];

            b.iter(|| {
                let graph = expand(black_box(&roots), Direction::Insert, &metadata, &links);
                black_box(graph.node_count());
            });
        });
    }
    group.finish();
}

/// Benchmark ordering of fully constrained chains in both directions.
fn bench_order_constrained(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_constrained");

    for size in [10i64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let metadata = self_ref_metadata(true);
            let links = MapLinks::chain(size);
            let roots = vec![node(0)];
            let graph = expand(&roots, Direction::Insert, &metadata, &links);

            b.iter(|| {
                let insert = order(black_box(&graph), Direction::Insert).unwrap();
                let delete = order(black_box(&graph), Direction::Delete).unwrap();
                black_box((insert.len(), delete.len()));
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_expand_chain,
    bench_expand_fan,
    bench_order_constrained
);
criterion_main!(benches);
