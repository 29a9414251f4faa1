use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use datastream::prelude::*;
use futures::future;
use tokio::runtime::Runtime;

const ITEMS: u64 = 10_000;

/// Benchmark fan-out through `tee`
///
/// Every branch consumes all items, so the source runs at the pace of the
/// slowest reader.
fn bench_tee_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_tee_fan_out");
    let runtime = Runtime::new().unwrap();
    group.throughput(Throughput::Elements(ITEMS));

    for branches in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(branches), &branches, |b, &branches| {
            b.to_async(&runtime).iter(|| async move {
                let mut pending = Vec::with_capacity(branches);
                let mut stream = DataStream::from_iterator(0..ITEMS);
                for _ in 0..branches {
                    stream = stream.tee(|copy| {
                        pending.push(copy.reduce(|acc, n| future::ready(Ok(acc + n)), 0u64));
                    });
                }

                stream.run().await.unwrap();
                for branch in pending {
                    black_box(branch.await.unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark chains of `pipe` hops between streams
fn bench_pipe_hops(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_pipe_hops");
    let runtime = Runtime::new().unwrap();
    group.throughput(Throughput::Elements(ITEMS));

    for hops in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(hops), &hops, |b, &hops| {
            b.to_async(&runtime).iter(|| async move {
                let mut stream = DataStream::from_iterator(0..ITEMS);
                for _ in 0..hops {
                    stream = stream.pipe(DataStream::new());
                }

                let items = stream.to_array().await.unwrap();
                black_box(items.len());
            });
        });
    }

    group.finish();
}

/// Benchmark writer backpressure against a slow consumer
///
/// Compares water mark settings with a producer writing through `send`.
fn bench_backpressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_backpressure");
    let runtime = Runtime::new().unwrap();
    group.throughput(Throughput::Elements(ITEMS));

    for (name, high, low) in [("tight", 2usize, 1usize), ("default", 16, 8), ("loose", 256, 128)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &(high, low), |b, &(high, low)| {
            b.to_async(&runtime).iter(|| async move {
                let options = StreamOptions::new().high_water_mark(high).low_water_mark(low);
                let stream: DataStream<u64> = DataStream::with_options(options).unwrap();
                let producer = stream.clone();

                tokio::spawn(async move {
                    for n in 0..ITEMS {
                        if producer.send(n).await.is_err() {
                            return;
                        }
                    }
                    producer.end();
                });

                let count = stream
                    .each(|n| {
                        let slow = n % 64 == 0;
                        async move {
                            if slow {
                                tokio::task::yield_now().await;
                            }
                            Ok(())
                        }
                    })
                    .reduce(|cnt, _| future::ready(Ok(cnt + 1)), 0u64)
                    .await
                    .unwrap();
                black_box(count);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tee_fan_out, bench_pipe_hops, bench_backpressure);
criterion_main!(benches);
