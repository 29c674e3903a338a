use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;

use once_core::{BlockingGuard, CooperativeGuard, GuardRegistry, SiteId};

fn bench_blocking_fresh_claim(c: &mut Criterion) {
    c.bench_function("blocking_fresh_claim", |b| {
        b.iter(|| {
            let guard = BlockingGuard::new();
            black_box(guard.run(|| 1u64))
        })
    });
}

fn bench_blocking_spent(c: &mut Criterion) {
    let guard = BlockingGuard::new();
    guard.run(|| ());

    c.bench_function("blocking_spent_skip", |b| {
        b.iter(|| black_box(guard.run(|| ())))
    });
}

fn bench_blocking_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_contention");

    for threads in [2, 8, 32] {
        group.bench_with_input(
            BenchmarkId::new("threads", threads),
            &threads,
            |b, &count| {
                b.iter(|| {
                    let guard = Arc::new(BlockingGuard::new());
                    let handles: Vec<_> = (0..count)
                        .map(|_| {
                            let guard = Arc::clone(&guard);
                            thread::spawn(move || guard.run(|| ()).is_some())
                        })
                        .collect();

                    // Exactly one winner per iteration
                    let winners = handles
                        .into_iter()
                        .map(|h| h.join().unwrap_or(false))
                        .filter(|won| *won)
                        .count();
                    black_box(winners)
                })
            },
        );
    }

    group.finish();
}

fn bench_cooperative_spent(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let guard = CooperativeGuard::new();
    runtime.block_on(guard.run(async {}));

    c.bench_function("cooperative_spent_skip", |b| {
        b.iter(|| black_box(runtime.block_on(guard.run(async {}))))
    });
}

fn bench_registry_lookup(c: &mut Criterion) {
    let registry = GuardRegistry::new();
    let sites: Vec<SiteId> = (0..1000)
        .map(|i| SiteId::new(format!("site_{}", i)).unwrap())
        .collect();
    for site in &sites {
        registry.blocking(site).unwrap();
    }

    c.bench_function("registry_lookup_1000_sites", |b| {
        b.iter(|| {
            for site in &sites {
                black_box(registry.blocking(site).unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_blocking_fresh_claim,
    bench_blocking_spent,
    bench_blocking_contention,
    bench_cooperative_spent,
    bench_registry_lookup
);
criterion_main!(benches);
