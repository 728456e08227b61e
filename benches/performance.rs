//! Performance benchmarks for the store engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fabric_store::{MutationRequest, StoreRegistry};
use serde_json::json;

const NO_STATES: [&str; 0] = [];

/// Benchmark put throughput with a growing number of change subscribers
fn bench_put_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_fan_out");

    for subscribers in [0, 1, 10, 50] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &count| {
                let registry = StoreRegistry::new();
                let store = registry.create_store("bench").unwrap();
                let streams: Vec<_> = (0..count)
                    .map(|_| {
                        let stream = store.on_all_changes(NO_STATES);
                        stream.subscribe(|record| {
                            black_box(record);
                        })
                        .unwrap();
                        stream
                    })
                    .collect();

                let mut i = 0u64;
                b.iter(|| {
                    store.put(format!("k{}", i % 1024), json!(i), "updated");
                    i += 1;
                });

                for stream in streams {
                    let _ = stream.unsubscribe();
                }
            },
        );
    }

    group.finish();
}

/// Benchmark point reads against stores of different sizes
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for size in [100, 10_000] {
        group.bench_with_input(BenchmarkId::new("items", size), &size, |b, &size| {
            let registry = StoreRegistry::new();
            let store = registry.create_store("bench").unwrap();
            store
                .populate((0..size).map(|i| (format!("k{}", i), json!({"n": i}))))
                .unwrap();

            let mut i = 0usize;
            b.iter(|| {
                black_box(store.get(&format!("k{}", i % size)));
                i += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark synchronous mutate routing with mixed filters
fn bench_mutate(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutate");

    for streams in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::new("streams", streams), &streams, |b, &count| {
            let registry = StoreRegistry::new();
            let store = registry.create_store("bench").unwrap();
            for n in 0..count {
                let types = if n % 2 == 0 { vec!["UPDATE"] } else { vec!["REMOVE"] };
                store
                    .on_mutation_request(types)
                    .subscribe(|request| {
                        request.succeed(json!(true));
                    })
                    .unwrap();
            }

            b.iter(|| {
                black_box(store.mutate(
                    MutationRequest::new(json!({"id": "o1"}), "UPDATE").on_success(|response| {
                        black_box(response);
                    }),
                ));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put_fan_out, bench_get, bench_mutate);
criterion_main!(benches);
