//! Full run benchmarks.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use geodelta_bench::utils::snapshot_pair;
use geodelta_core::{SyncConfig, SyncEngine};
use geodelta_storage::GeometryKind;
use tempfile::TempDir;

/// Benchmark detect-only runs, which leave the snapshots untouched.
fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");
    group.sample_size(20);

    for kind in GeometryKind::ALL {
        let (initial, latest) = snapshot_pair(4, kind, 5_000, 50);
        let scratch = TempDir::new().unwrap();
        let engine =
            SyncEngine::new(SyncConfig::new().detect_only(true).scratch_dir(scratch.path()));

        group.bench_function(BenchmarkId::from_parameter(kind), |b| {
            b.iter(|| engine.run(&initial, &latest).unwrap());
        });
    }

    group.finish();
}

/// Benchmark full runs on fresh snapshots, comparing worker caps for
/// point collections.
fn bench_sync_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_point_workers");
    group.sample_size(10);

    for workers in [1, 2, 4].iter() {
        let scratch = TempDir::new().unwrap();
        let engine =
            SyncEngine::new(SyncConfig::new().max_workers(*workers).scratch_dir(scratch.path()));

        group.bench_with_input(BenchmarkId::from_parameter(workers), workers, |b, _| {
            b.iter_batched(
                || snapshot_pair(8, GeometryKind::Point, 2_000, 20),
                |(initial, latest)| engine.run(&initial, &latest).unwrap(),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detect, bench_sync_workers);
criterion_main!(benches);
