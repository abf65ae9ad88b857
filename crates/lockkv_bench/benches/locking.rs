//! Uncontended locker benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lockkv_core::{Key, KeyOrdering, Locker, LockerKind, ReadWriteLock};

fn keys(count: usize) -> Vec<Key> {
    (0..count).map(|i| Key::new(i.to_string())).collect()
}

/// Benchmark a raw read-write lock.
fn bench_rwlock(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let mut group = c.benchmark_group("rwlock");

    group.bench_function("write", |b| {
        let lock = ReadWriteLock::new();
        b.iter(|| {
            rt.block_on(lock.acquire_write());
            lock.release_write();
        });
    });

    group.bench_function("read", |b| {
        let lock = ReadWriteLock::new();
        b.iter(|| {
            rt.block_on(lock.acquire_read());
            lock.release_read();
        });
    });

    group.finish();
}

/// Benchmark write acquisition of key sets of growing size.
fn bench_key_sets(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let mut group = c.benchmark_group("acquire_write");

    for kind in LockerKind::ALL {
        for ordering in [KeyOrdering::AsGiven, KeyOrdering::Canonical] {
            if kind != LockerKind::FineGrained && ordering == KeyOrdering::Canonical {
                continue;
            }
            let locker = kind.build(ordering);

            for size in [1usize, 2, 8, 32] {
                let mut set = keys(size);
                set.reverse();
                group.bench_with_input(
                    BenchmarkId::new(format!("{kind}/{ordering}"), size),
                    &set,
                    |b, set| {
                        b.iter(|| {
                            rt.block_on(locker.acquire_write(black_box(set)));
                            locker.release_write(set);
                        });
                    },
                );
            }
        }
    }

    group.finish();
}

criterion_group!(benches, bench_rwlock, bench_key_sets);
criterion_main!(benches);
