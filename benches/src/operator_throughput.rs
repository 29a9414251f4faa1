use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use datastream::prelude::*;
use futures::future;
use tokio::runtime::Runtime;

const ITEMS: u64 = 10_000;

/// Benchmark `map` with synchronous work under varying parallelism
///
/// Measures the cost of ordered completion and backpressure, since the
/// transform itself does almost nothing.
fn bench_map_parallelism(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_map_parallelism");
    let runtime = Runtime::new().unwrap();
    group.throughput(Throughput::Elements(ITEMS));

    for max_parallel in [1usize, 4, 16, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(max_parallel),
            &max_parallel,
            |b, &max_parallel| {
                b.to_async(&runtime).iter(|| async move {
                    let source = DataStream::from_iterator(0..ITEMS);
                    source
                        .set_options(StreamOptions::new().max_parallel(max_parallel))
                        .unwrap();

                    let sum = source
                        .map(|n| future::ready(Ok(n * 2)))
                        .reduce(|acc, n| future::ready(Ok(acc + n)), 0u64)
                        .await
                        .unwrap();
                    black_box(sum);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark `map` where every transform yields to the scheduler
fn bench_map_async_work(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_map_async");
    let runtime = Runtime::new().unwrap();
    group.throughput(Throughput::Elements(ITEMS));

    for max_parallel in [1usize, 16, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(max_parallel),
            &max_parallel,
            |b, &max_parallel| {
                b.to_async(&runtime).iter(|| async move {
                    let source = DataStream::from_iterator(0..ITEMS);
                    source
                        .set_options(StreamOptions::new().max_parallel(max_parallel))
                        .unwrap();

                    let out = source
                        .map(|n| async move {
                            tokio::task::yield_now().await;
                            Ok(n + 1)
                        })
                        .run()
                        .await;
                    black_box(out).unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a chain of item-preserving operators
fn bench_operator_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_chain");
    let runtime = Runtime::new().unwrap();
    group.throughput(Throughput::Elements(ITEMS));

    group.bench_function("filter_each_take_while", |b| {
        b.to_async(&runtime).iter(|| async {
            let items = DataStream::from_iterator(0..ITEMS)
                .filter(|n| future::ready(Ok(n % 3 != 0)))
                .each(|_| future::ready(Ok(())))
                .take_while(|n| future::ready(Ok(*n < ITEMS - 1)))
                .to_array()
                .await
                .unwrap();
            black_box(items.len());
        });
    });

    group.bench_function("registered_chain", |b| {
        let registry = Registry::new();
        registry.register::<u64, Plain>(
            "bench/chain",
            OperatorChain::new()
                .map(|n: u64| future::ready(Ok(n + 1)))
                .filter(|n| future::ready(Ok(n % 2 == 0))),
        );

        let registry = &registry;
        b.to_async(&runtime).iter(|| async move {
            let count = DataStream::from_iterator(0..ITEMS)
                .use_with(registry, "bench/chain")
                .unwrap()
                .reduce(|cnt, _| future::ready(Ok(cnt + 1)), 0usize)
                .await
                .unwrap();
            black_box(count);
        });
    });

    group.finish();
}

/// Benchmark splitting text chunks into lines
fn bench_string_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("operator_split");
    let runtime = Runtime::new().unwrap();

    let chunks: Vec<String> = (0..1_000)
        .map(|i| format!("line {i} first\nline {i} second\npartial {i} "))
        .collect();
    group.throughput(Throughput::Elements(chunks.len() as u64));

    group.bench_function("newline", |b| {
        b.to_async(&runtime).iter(|| {
            let chunks = chunks.clone();
            async move {
                let lines = StringStream::from_array_in(Text, chunks)
                    .split("\n")
                    .to_array()
                    .await
                    .unwrap();
                black_box(lines.len());
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_map_parallelism,
    bench_map_async_work,
    bench_operator_chain,
    bench_string_split
);
criterion_main!(benches);
