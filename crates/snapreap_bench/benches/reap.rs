//! Scan and delete benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use snapreap_bench::{bulk_snapshot, wide_snapshot};
use snapreap_core::{AgeBasis, ExpiryPolicy, ROOT_PATH};
use snapreap_engine::{MemoryService, NoopObserver, ReapConfig, ReapEngine};
use snapreap_testkit::FIXED_NOW_MS;

fn config() -> ReapConfig {
    ReapConfig::new(ROOT_PATH, ExpiryPolicy::new(AgeBasis::Mtime, 30)).with_now_ms(FIXED_NOW_MS)
}

/// Benchmark the scan phase over flat and nested trees.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for count in [1_000, 10_000].iter() {
        let snapshot = bulk_snapshot(*count, 0);
        group.bench_with_input(BenchmarkId::new("flat", count), &snapshot, |b, snapshot| {
            let engine = ReapEngine::new(&snapshot.tree, config());
            b.iter(|| black_box(engine.scan().unwrap()));
        });
    }

    let snapshot = wide_snapshot(500, 8);
    group.bench_function("nested", |b| {
        let engine = ReapEngine::new(&snapshot.tree, config());
        b.iter(|| black_box(engine.scan().unwrap()));
    });

    group.finish();
}

/// Benchmark a full dry run.
fn bench_dry_run(c: &mut Criterion) {
    let snapshot = wide_snapshot(1_000, 4);

    c.bench_function("dry_run", |b| {
        b.iter(|| {
            let report = ReapEngine::new(&snapshot.tree, config().with_dry_run(true))
                .run(None, &NoopObserver)
                .unwrap();
            black_box(report);
        });
    });
}

/// Benchmark deletes against the in-memory service at several parallelism levels.
fn bench_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete");
    let snapshot = wide_snapshot(1_000, 4);

    for parallelism in [1, 4].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(parallelism),
            parallelism,
            |b, &parallelism| {
                b.iter_batched(
                    || MemoryService::from_tree(&snapshot.tree),
                    |service| {
                        let report =
                            ReapEngine::new(&snapshot.tree, config().with_parallelism(parallelism))
                                .run(Some(&service), &NoopObserver)
                                .unwrap();
                        black_box(report);
                    },
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_scan, bench_dry_run, bench_delete);
criterion_main!(benches);
