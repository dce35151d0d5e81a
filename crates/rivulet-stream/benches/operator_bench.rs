//! Benchmarks for synchronous operator chains.
//!
//! Run with: cargo bench -p rivulet-stream

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rivulet_stream::{Observable, Stream, flatten};
use std::hint::black_box;

type Obs = Observable<u64, String>;

/// Observe `obs` to completion and return how many events arrived.
fn drain(obs: &Obs) -> usize {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let _sub = obs.observe(move |_| {
        c.fetch_add(1, Ordering::Relaxed);
    });
    count.load(Ordering::Relaxed)
}

fn bench_map_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream/map_filter");

    for n in [10u64, 100, 1_000] {
        let chain = Obs::from_values(0..n)
            .map(|v| v * 3)
            .filter(|v| v % 2 == 0)
            .map(|v| v + 1);
        group.bench_with_input(BenchmarkId::new("chain", n), &chain, |b, chain| {
            b.iter(|| black_box(drain(chain)))
        });
    }

    group.finish();
}

fn bench_take_skip(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream/take_skip");

    for n in [100u64, 1_000] {
        let source = Obs::from_values(0..n);
        let take = source.take(n as usize / 2);
        let skip = source.skip(n as usize / 2);
        let take_last = source.take_last(10);
        group.bench_with_input(BenchmarkId::new("take_half", n), &take, |b, obs| {
            b.iter(|| black_box(drain(obs)))
        });
        group.bench_with_input(BenchmarkId::new("skip_half", n), &skip, |b, obs| {
            b.iter(|| black_box(drain(obs)))
        });
        group.bench_with_input(BenchmarkId::new("take_last_10", n), &take_last, |b, obs| {
            b.iter(|| black_box(drain(obs)))
        });
    }

    group.finish();
}

fn bench_combinators(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream/combinators");

    for n in [100u64, 1_000] {
        let zipped = Obs::from_values(0..n)
            .zip_with(&Obs::from_values(0..n))
            .map(|(a, b)| a + b);
        group.bench_with_input(BenchmarkId::new("zip", n), &zipped, |b, obs| {
            b.iter(|| black_box(drain(obs)))
        });

        let nested = Observable::<Obs, String>::from_values(
            (0..n / 10).map(|i| Obs::from_values(i * 10..i * 10 + 10)).collect::<Vec<_>>(),
        );
        let merged = flatten(&nested);
        group.bench_with_input(BenchmarkId::new("flatten_10_each", n), &merged, |b, obs| {
            b.iter(|| black_box(drain(obs)))
        });
    }

    group.finish();
}

fn bench_observe_dispose(c: &mut Criterion) {
    let never = Obs::never().map(|v| v + 1);
    c.bench_function("stream/observe_dispose", |b| {
        b.iter(|| {
            let sub = never.observe(|_| {});
            sub.dispose();
            black_box(sub.is_disposed())
        })
    });
}

criterion_group!(
    benches,
    bench_map_filter,
    bench_take_skip,
    bench_combinators,
    bench_observe_dispose,
);

criterion_main!(benches);
