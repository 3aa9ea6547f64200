//! Benchmarks for clock comparison and sibling merging.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ratings_core::{merge, SiblingSet, VectorClock, Version};

fn clock_for(writer: usize, count: u64) -> VectorClock {
    [(format!("w{}", writer), count)].into_iter().collect()
}

/// A sibling set of `n` mutually concurrent versions, one per writer.
fn concurrent_set(n: usize) -> SiblingSet {
    (0..n).fold(SiblingSet::new(), |set, i| {
        merge(set, Version::new(i as f64, clock_for(i, 1))).into_siblings()
    })
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_compare");

    for writers in [4, 32, 256] {
        let a: VectorClock = (0..writers).map(|i| (format!("w{}", i), i as u64)).collect();
        let b = a.increment("w0");
        group.bench_with_input(BenchmarkId::from_parameter(writers), &writers, |bench, _| {
            bench.iter(|| black_box(a.compare(black_box(&b))));
        });
    }
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for siblings in [1, 8, 64] {
        let set = concurrent_set(siblings);
        let concurrent = Version::new(3.0, clock_for(siblings + 1, 1));
        let coalescing = Version::new(3.0, set.context().increment("w0"));

        group.bench_with_input(
            BenchmarkId::new("concurrent", siblings),
            &siblings,
            |bench, _| {
                bench.iter(|| black_box(merge(set.clone(), concurrent.clone())));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("coalescing", siblings),
            &siblings,
            |bench, _| {
                bench.iter(|| black_box(merge(set.clone(), coalescing.clone())));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_compare, bench_merge);
criterion_main!(benches);
