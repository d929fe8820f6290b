//! Performance benchmarks for the training session hot path.
//!
//! Tracks the cost of a full optimization step and of the validation-only
//! path across input sizes, plus checkpoint serialization throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use escalar::io::Checkpoint;
use escalar::net::{Network, SubPixelNet};
use escalar::train::{SessionConfig, SyntheticPairs, TrainingSession};
use tempfile::tempdir;

fn bench_session(size: usize, dir: &std::path::Path) -> TrainingSession {
    let mut config = SessionConfig::new(2, 1e-3, dir);
    config.network.hidden_channels = 16;
    config.network.seed = Some(0);
    let mut session = TrainingSession::new(config).unwrap();

    let mut pairs = SyntheticPairs::new(size, size, 2, 42);
    let (low, high) = pairs.next_pair().unwrap();
    session.feed_data(low, high).unwrap();
    session
}

/// Benchmark the full optimization step (forward, backward, update)
fn bench_optimize_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("TrainingSession");

    for size in [4usize, 8, 16].iter() {
        let dir = tempdir().unwrap();
        let mut session = bench_session(*size, dir.path());

        // Output pixels produced per step
        group.throughput(Throughput::Elements((size * size * 4) as u64));
        group.bench_with_input(BenchmarkId::new("optimize_step", size), size, |b, _| {
            b.iter(|| session.optimize_step().unwrap());
        });
    }
    group.finish();
}

/// Benchmark the validation path (forward only, no parameter updates)
fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("TrainingSession");

    for size in [4usize, 8, 16].iter() {
        let dir = tempdir().unwrap();
        let mut session = bench_session(*size, dir.path());

        group.throughput(Throughput::Elements((size * size * 4) as u64));
        group.bench_with_input(BenchmarkId::new("evaluate", size), size, |b, _| {
            b.iter(|| session.evaluate().unwrap());
        });
    }
    group.finish();
}

/// Benchmark the raw network forward pass over image stacks
fn bench_network_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("SubPixelNet");

    let net = SubPixelNet::new(2, 64, Some(0));
    for batch in [1usize, 4, 16].iter() {
        let mut pairs = SyntheticPairs::new(8, 8, 2, 7);
        let mut stack = Vec::with_capacity(*batch * 64);
        for _ in 0..*batch {
            let (low, _) = pairs.next_pair().unwrap();
            stack.extend(low.data().iter().copied());
        }
        let input =
            escalar::Tensor::from_shape_vec(&[*batch, 8, 8], stack, false).unwrap();

        group.throughput(Throughput::Elements((batch * 64) as u64));
        group.bench_with_input(BenchmarkId::new("forward_8x8", batch), batch, |b, _| {
            b.iter(|| black_box(net.forward(&input).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark checkpoint snapshot and JSON serialization
fn bench_checkpoint_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("Checkpoint");

    for hidden in [16usize, 64, 256].iter() {
        let net = SubPixelNet::new(2, *hidden, Some(0));
        let params = net.num_parameters();

        group.throughput(Throughput::Elements(params as u64));
        group.bench_with_input(BenchmarkId::new("to_json", hidden), hidden, |b, _| {
            b.iter(|| {
                let checkpoint = Checkpoint::from_network("G", 100, &net);
                black_box(serde_json::to_string(&checkpoint.to_state()).unwrap())
            });
        });
    }
    group.finish();
}

/// Benchmark the synthetic data generator
fn bench_synthetic_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("SyntheticPairs");

    for size in [8usize, 32].iter() {
        let mut pairs = SyntheticPairs::new(*size, *size, 2, 3);

        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("next_pair", size), size, |b, _| {
            b.iter(|| black_box(pairs.next_pair().unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_optimize_step,
    bench_evaluate,
    bench_network_forward,
    bench_checkpoint_serialize,
    bench_synthetic_pairs
);
criterion_main!(benches);
