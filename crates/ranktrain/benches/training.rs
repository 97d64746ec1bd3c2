//! Training benchmarks.
//!
//! ```bash
//! cargo bench --bench training
//! ```
//!
//! HTML reports are generated in `target/criterion/`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ranktrain::data::{prepare_records, BinnedDataset};
use ranktrain::model::{RankerConfig, RankerTrainer};
use ranktrain::testing::synthetic_feedback;
use ranktrain::training::{Gradients, LabelGain, LambdaRankLoss, ObjectiveFn};
use ranktrain::{FeatureSchema, Parallelism};

fn bench_train(c: &mut Criterion) {
    let schema = FeatureSchema::retrieval_v1();
    let mut group = c.benchmark_group("train");
    group.sample_size(10);

    for &n_queries in &[100usize, 1_000] {
        let records = synthetic_feedback(n_queries, 20, 42);
        let set = prepare_records(records, &schema).unwrap().training_set;
        group.throughput(Throughput::Elements(set.n_rows() as u64));

        for &n_threads in &[1usize, 0] {
            let config = RankerConfig::builder()
                .n_rounds(50)
                .n_threads(n_threads)
                .build()
                .unwrap();
            let id = format!("{n_queries}q/threads={n_threads}");
            group.bench_with_input(BenchmarkId::from_parameter(id), &set, |b, set| {
                b.iter(|| {
                    let trainer = RankerTrainer::new(config.clone()).unwrap();
                    black_box(trainer.train(black_box(set)).unwrap())
                })
            });
        }
    }
    group.finish();
}

fn bench_gradients(c: &mut Criterion) {
    let schema = FeatureSchema::retrieval_v1();
    let records = synthetic_feedback(1_000, 30, 7);
    let set = prepare_records(records, &schema).unwrap().training_set;
    let groups = set.groups();
    let scores: Vec<f64> = (0..set.n_rows()).map(|i| (i % 17) as f64 * 0.1).collect();
    let loss = LambdaRankLoss::new(LabelGain::default(), 1.0, 30, true);
    let mut gradients = Gradients::new(set.n_rows());

    let mut group = c.benchmark_group("lambdarank_gradients");
    group.throughput(Throughput::Elements(set.n_rows() as u64));
    for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
        group.bench_function(format!("{parallelism:?}"), |b| {
            b.iter(|| {
                loss.compute_gradients(
                    black_box(&scores),
                    set.labels(),
                    &groups,
                    &mut gradients,
                    parallelism,
                )
            })
        });
    }
    group.finish();
}

fn bench_binning(c: &mut Criterion) {
    let schema = FeatureSchema::retrieval_v1();
    let records = synthetic_feedback(2_000, 25, 3);
    let set = prepare_records(records, &schema).unwrap().training_set;

    c.bench_function("bin_features", |b| {
        b.iter(|| BinnedDataset::from_features(black_box(set.features()), 255, Parallelism::Parallel))
    });
}

criterion_group!(benches, bench_train, bench_gradients, bench_binning);
criterion_main!(benches);
