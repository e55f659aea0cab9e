//! Benchmark for Transient data structures.
//!
//! Compares TransientVector, TransientHashMap and TransientSortedMap against
//! their persistent counterparts for batch operations, and measures the
//! cost of a persistent -> transient -> persistent round trip.

use cowtrie::persistent::{
    PersistentHashMap, PersistentSortedMap, PersistentVector, TransientHashMap, TransientSortedMap,
    TransientVector,
};
use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

// =============================================================================
// TransientVector Benchmarks
// =============================================================================

fn benchmark_transient_vector_push_back(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_vector_push_back");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientVector::new();
                    for index in 0..size {
                        transient.push_back(black_box(index));
                    }
                    black_box(transient.persistent())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut vector = PersistentVector::new();
                    for index in 0..size {
                        vector = vector.push_back(black_box(index));
                    }
                    black_box(vector)
                });
            },
        );
    }

    group.finish();
}

fn benchmark_transient_vector_set(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_vector_set");

    for size in [1_000_usize, 10_000, 100_000] {
        let persistent_vector: PersistentVector<usize> = (0..size).collect();

        group.bench_with_input(
            BenchmarkId::new("TransientVector", size),
            &size,
            |bencher, &size| {
                bencher.iter_batched(
                    || persistent_vector.clone().transient(),
                    |mut transient| {
                        for index in (0..size).step_by(10) {
                            transient.set(black_box(index), black_box(999));
                        }
                        black_box(transient.persistent())
                    },
                    BatchSize::SmallInput,
                );
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut vector = persistent_vector.clone();
                    for index in (0..size).step_by(10) {
                        vector = vector.set(black_box(index), black_box(999));
                    }
                    black_box(vector)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// TransientHashMap Benchmarks
// =============================================================================

fn benchmark_transient_hashmap_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_hashmap_insert");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientHashMap::new();
                    for index in 0..size {
                        transient.insert(black_box(index), black_box(index));
                    }
                    black_box(transient.persistent())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = PersistentHashMap::new();
                    for index in 0..size {
                        map = map.insert(black_box(index), black_box(index));
                    }
                    black_box(map)
                });
            },
        );
    }

    group.finish();
}

fn benchmark_transient_hashmap_remove(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_hashmap_remove");

    for size in [1_000, 10_000] {
        let persistent_map: PersistentHashMap<i32, i32> =
            (0..size).map(|index| (index, index)).collect();

        group.bench_with_input(
            BenchmarkId::new("TransientHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter_batched(
                    || persistent_map.clone().transient(),
                    |mut transient| {
                        for key in (0..size).step_by(2) {
                            transient.remove(&black_box(key));
                        }
                        black_box(transient.persistent())
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

// =============================================================================
// TransientSortedMap Benchmarks
// =============================================================================

fn benchmark_transient_sorted_map_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_sorted_map_insert");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientSortedMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientSortedMap::new();
                    for index in 0..size {
                        transient.insert(black_box(index), black_box(index));
                    }
                    black_box(transient.persistent())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentSortedMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = PersistentSortedMap::new();
                    for index in 0..size {
                        map = map.insert(black_box(index), black_box(index));
                    }
                    black_box(map)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Roundtrip Benchmark
// =============================================================================

fn benchmark_roundtrip(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_roundtrip");

    for size in [1_000, 100_000] {
        let vector: PersistentVector<i32> = (0..size).collect();
        let map: PersistentHashMap<i32, i32> = (0..size).map(|key| (key, key)).collect();
        let sorted: PersistentSortedMap<i32, i32> = (0..size).map(|key| (key, key)).collect();

        group.bench_with_input(BenchmarkId::new("vector", size), &size, |bencher, _| {
            bencher.iter(|| black_box(vector.clone().transient().persistent()));
        });
        group.bench_with_input(BenchmarkId::new("hashmap", size), &size, |bencher, _| {
            bencher.iter(|| black_box(map.clone().transient().persistent()));
        });
        group.bench_with_input(BenchmarkId::new("sorted_map", size), &size, |bencher, _| {
            bencher.iter(|| black_box(sorted.clone().transient().persistent()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_transient_vector_push_back,
    benchmark_transient_vector_set,
    benchmark_transient_hashmap_insert,
    benchmark_transient_hashmap_remove,
    benchmark_transient_sorted_map_insert,
    benchmark_roundtrip
);
criterion_main!(benches);
