//! Transaction throughput benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use relmap_bench::utils::{bench_manager, node, node_row};
use relmap_core::{LockKind, ObjectRef};
use relmap_store::Value;

/// Benchmark committing batches of fresh inserts.
fn bench_batch_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_insert");

    for batch in [10i64, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let manager = bench_manager(false);
            let mut offset = 0i64;

            b.iter(|| {
                let mut txn = manager.begin();
                for key in offset..offset + batch {
                    manager
                        .mark_for_insert(&mut txn, node(key), node_row(key))
                        .unwrap();
                }
                manager.commit(&mut txn).unwrap();
                offset += batch;
            });
        });
    }
    group.finish();
}

/// Benchmark linked inserts flowing through cascade expansion.
fn bench_cascade_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_insert");

    for chain in [10i64, 100].iter() {
        group.throughput(Throughput::Elements(*chain as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chain), chain, |b, &chain| {
            let manager = bench_manager(true);
            let mut offset = 0i64;

            b.iter(|| {
                let mut txn = manager.begin();
                for key in offset..offset + chain {
                    manager
                        .mark_for_insert(&mut txn, node(key), node_row(key))
                        .unwrap();
                }
                for key in offset..offset + chain - 1 {
                    manager
                        .link(&mut txn, &node(key), "next", ObjectRef::lazy(node(key + 1)))
                        .unwrap();
                }
                manager.commit(&mut txn).unwrap();
                offset += chain;
            });
        });
    }
    group.finish();
}

/// Benchmark repeated identity-map reads of one hot row.
fn bench_hot_find(c: &mut Criterion) {
    let manager = bench_manager(false);
    let mut setup = manager.begin();
    manager.mark_for_insert(&mut setup, node(1), node_row(1)).unwrap();
    manager.commit(&mut setup).unwrap();

    c.bench_function("hot_find", |b| {
        let mut txn = manager.begin();
        b.iter(|| {
            let handle = manager.find(&mut txn, black_box(&node(1))).unwrap().unwrap();
            black_box(handle.read().len());
        });
    });
}

/// Benchmark lock-modify-commit update cycles on random rows.
fn bench_update_cycle(c: &mut Criterion) {
    let manager = bench_manager(false);
    let mut setup = manager.begin();
    for key in 0..1000 {
        manager.mark_for_insert(&mut setup, node(key), node_row(key)).unwrap();
    }
    manager.commit(&mut setup).unwrap();

    c.bench_function("update_cycle", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let key = rng.gen_range(0..1000);
            let mut txn = manager.begin();
            let handle = manager.lock(&mut txn, &node(key), LockKind::Write).unwrap();
            handle.write().set("payload", Value::Int(key));
            manager.commit(&mut txn).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_batch_insert,
    bench_cascade_insert,
    bench_hot_find,
    bench_update_cycle
);
criterion_main!(benches);
