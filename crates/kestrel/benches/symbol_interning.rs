// Symbol interning benchmarks
//
// This benchmark suite measures:
// - Hit and miss cost of `intern`
// - Hash function comparison (DefaultHasher, FxHash, AHash)
// - Table lock contention under concurrency
// - Reverse mapping with `qmap`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kestrel::SymbolTable;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread;

/// Benchmark hit performance - repeatedly intern the same name
fn bench_intern_hit(c: &mut Criterion) {
    let table = SymbolTable::new();
    table.intern("windowDidResize");

    c.bench_function("intern_hit", |b| {
        b.iter(|| black_box(table.intern("windowDidResize")))
    });
}

/// Benchmark miss performance - intern unique names
fn bench_intern_miss(c: &mut Criterion) {
    let table = SymbolTable::new();
    let mut counter = 0u64;
    c.bench_function("intern_miss", |b| {
        b.iter(|| {
            counter = counter.wrapping_add(1);
            let name = format!("uniqueName{counter}");
            black_box(table.intern(&name))
        })
    });
}

/// Benchmark hash computation for different name lengths
fn bench_hash_computation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_computation");

    let test_cases = vec![
        ("name", 4),
        ("windowDidResize", 15),
        ("application-will-terminate-soon", 31),
        ("org.example.runtime.symbols.quark.table", 39),
    ];

    for (name, length) in test_cases {
        group.bench_with_input(BenchmarkId::new("DefaultHasher", length), name, |b, s| {
            b.iter(|| {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                s.hash(&mut hasher);
                black_box(hasher.finish())
            })
        });

        group.bench_with_input(BenchmarkId::new("FxHash", length), name, |b, s| {
            b.iter(|| {
                let mut hasher = fxhash::FxHasher::default();
                s.hash(&mut hasher);
                black_box(hasher.finish())
            })
        });

        group.bench_with_input(BenchmarkId::new("AHash", length), name, |b, s| {
            b.iter(|| {
                let mut hasher = ahash::AHasher::default();
                s.hash(&mut hasher);
                black_box(hasher.finish())
            })
        });
    }

    group.finish();
}

/// Benchmark lock contention with multiple threads hitting one table
fn bench_lock_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern_contention");
    let table = Arc::new(SymbolTable::new());
    table.intern("sharedName");

    for thread_count in [1, 2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(thread_count),
            thread_count,
            |b, &num_threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let table = Arc::clone(&table);
                            thread::spawn(move || {
                                for _ in 0..1000 {
                                    black_box(table.intern("sharedName"));
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            },
        );
    }

    group.finish();
}

/// Benchmark throughput - names interned into a fresh table, growth included
fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern_throughput");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            let names: Vec<String> = (0..n).map(|i| format!("name{i}")).collect();

            b.iter(|| {
                let table = SymbolTable::new();
                for name in &names {
                    black_box(table.intern(name));
                }
            })
        });
    }

    group.finish();
}

/// Benchmark reverse mapping of issued quarks
fn bench_qmap(c: &mut Criterion) {
    let table = SymbolTable::new();
    let quarks: Vec<_> = (0..100).map(|i| table.intern(&format!("mapped{i}"))).collect();

    c.bench_function("qmap", |b| {
        b.iter(|| {
            for quark in &quarks {
                black_box(table.qmap(*quark).unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_intern_hit,
    bench_intern_miss,
    bench_hash_computation,
    bench_lock_contention,
    bench_throughput,
    bench_qmap
);

criterion_main!(benches);
