//! Benchmarks for the snapshot mailbox.
//!
//! The watch loop pushes from one task while consumers take from others; these
//! benchmarks measure the hand-off cost and that pushes stay cheap when nobody
//! is reading.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use runtimevar::core::{Mailbox, Snapshot, Version};
use std::sync::Arc;

fn snapshot(i: u64) -> Arc<Snapshot<u64>> {
    Arc::new(Snapshot::new(i, Version::new(i), None))
}

/// Benchmark a push immediately followed by a take
fn benchmark_push_take(c: &mut Criterion) {
    let mailbox = Mailbox::new();
    let value = snapshot(1);

    let mut group = c.benchmark_group("push_take");
    group.bench_function("single", |b| {
        b.iter(|| {
            mailbox.push(Arc::clone(&value));
            black_box(mailbox.try_take());
        });
    });
    group.finish();
}

/// Benchmark bursts of pushes with no reader, which overwrite the slot
fn benchmark_overwrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("overwrite");

    for burst in [1u64, 16, 256] {
        group.throughput(Throughput::Elements(burst));
        group.bench_with_input(BenchmarkId::from_parameter(burst), &burst, |b, &burst| {
            let mailbox = Mailbox::new();
            let values: Vec<_> = (0..burst).map(snapshot).collect();

            b.iter(|| {
                for value in &values {
                    mailbox.push(Arc::clone(value));
                }
                black_box(mailbox.try_take());
            });
        });
    }

    group.finish();
}

/// Benchmark an async consumer receiving from a concurrent producer
fn benchmark_async_recv(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("async_recv");
    group.sample_size(20);

    group.bench_function("producer_consumer", |b| {
        b.iter_custom(|iters| {
            runtime.block_on(async move {
                let mailbox = Arc::new(Mailbox::new());
                let producer = {
                    let mailbox = Arc::clone(&mailbox);
                    tokio::spawn(async move {
                        for i in 1..=iters {
                            mailbox.push(snapshot(i));
                            tokio::task::yield_now().await;
                        }
                        mailbox.close();
                    })
                };

                let start = std::time::Instant::now();
                let mut received = 0u64;
                while let Some(s) = mailbox.recv().await {
                    black_box(s.value().ok());
                    received += 1;
                }
                let duration = start.elapsed();

                producer.await.unwrap();
                black_box(received);
                duration
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_push_take,
    benchmark_overwrite,
    benchmark_async_recv
);
criterion_main!(benches);
