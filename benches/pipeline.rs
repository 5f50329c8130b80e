//! Criterion benchmarks for the execution pipeline.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use vilij::algorithm::{self, AlgorithmKind, ProducerContext};
use vilij::channel::ResultChannel;
use vilij::config::RunRequest;
use vilij::dataset::Dataset;
use vilij::observer::DatasetView;

fn make_dataset(n: usize) -> Dataset {
    let text: String = (0..n)
        .map(|i| format!("@p{i}\tl{}\t{},{}\n", i % 2, i % 17, (i * 7) % 23))
        .collect();
    Dataset::from_tsd(&text).unwrap().dataset
}

/// Producer and consumer on separate threads, unpaced.
fn bench_channel_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_handoff");

    for count in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let channel = Arc::new(ResultChannel::<usize>::new());
                let producer = {
                    let channel = Arc::clone(&channel);
                    thread::spawn(move || {
                        for i in 0..count {
                            channel.add(i);
                        }
                        channel.interrupt(vilij::channel::Interrupt::Closed);
                    })
                };
                let mut sum = 0usize;
                while let Ok(v) = channel.take() {
                    sum += v;
                }
                producer.join().unwrap();
                black_box(sum)
            });
        });
    }

    group.finish();
}

/// Full producer loop for both algorithms, publishing every iteration.
fn bench_algorithm_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("algorithm_run");
    let request = RunRequest::new(1_000, 1).with_early_stop(None).with_seed(42);

    for size in [16usize, 256].iter() {
        for kind in [AlgorithmKind::Classification, AlgorithmKind::Clustering] {
            group.bench_with_input(BenchmarkId::new(kind.to_string(), size), size, |b, &size| {
                let dataset = Arc::new(RwLock::new(make_dataset(size)));
                let config = request.validate(kind).unwrap();
                b.iter(|| {
                    let mut algo = algorithm::build(kind, Arc::clone(&dataset), config.clone());
                    let channel = ResultChannel::new();
                    let halt = AtomicBool::new(false);
                    let end = algo.run(&ProducerContext::new(&channel, &halt));
                    black_box((end, channel.len()))
                });
            });
        }
    }

    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    let dataset = make_dataset(512);
    let view = DatasetView::capture(&dataset).unwrap();
    let shared = Arc::new(RwLock::new(dataset));
    let config = RunRequest::new(1, 1)
        .with_cluster_count(4)
        .with_seed(7)
        .validate(AlgorithmKind::Clustering)
        .unwrap();

    group.bench_function("clustering_partition", |b| {
        let mut algo = algorithm::build(AlgorithmKind::Clustering, Arc::clone(&shared), config.clone());
        algo.step(1);
        let snapshot = algo.snapshot(1);
        b.iter(|| black_box(view.project(&snapshot)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_channel_handoff,
    bench_algorithm_run,
    bench_projection,
);

criterion_main!(benches);
