//! Training behaviour on synthetic feedback.

mod common;

use approx::assert_abs_diff_eq;
use ranktrain::data::BinnedDataset;
use ranktrain::model::{RankerConfig, RankerTrainer};
use ranktrain::training::gbdt::{GBDTParams, GBDTTrainer};
use ranktrain::training::{LabelGain, LambdaRankLoss, MetricFn, Ndcg};
use ranktrain::Parallelism;

use common::{fast_config, synthetic_set};

fn ndcg_at_5(history: &[ranktrain::training::gbdt::RoundMetrics], idx: usize) -> f64 {
    history[idx]
        .metrics
        .iter()
        .find(|m| m.name == "ndcg@5")
        .map(|m| m.value)
        .expect("ndcg@5 recorded")
}

#[test]
fn training_is_deterministic() {
    let set = synthetic_set(30, 8, 11);
    let train = || {
        RankerTrainer::new(fast_config(15))
            .unwrap()
            .train(&set)
            .unwrap()
    };
    let a = train();
    let b = train();

    assert_eq!(a.forest(), b.forest());
    assert_eq!(a.meta().training_metrics, b.meta().training_metrics);
    assert_eq!(
        a.predict(set.features()).unwrap(),
        b.predict(set.features()).unwrap()
    );
}

#[test]
fn thread_count_does_not_change_the_model() {
    let set = synthetic_set(30, 8, 13);
    let train = |n_threads| {
        let config = RankerConfig {
            n_threads,
            ..fast_config(10)
        };
        RankerTrainer::new(config).unwrap().train(&set).unwrap()
    };
    let sequential = train(1);
    let parallel = train(4);
    assert_eq!(sequential.forest(), parallel.forest());
}

#[test]
fn training_ndcg_improves() {
    let set = synthetic_set(60, 10, 17);
    let config = RankerConfig {
        log_every: 1,
        ..fast_config(30)
    };
    let model = RankerTrainer::new(config).unwrap().train(&set).unwrap();
    let history = &model.meta().training_metrics;
    assert_eq!(history.len(), 30);

    let first = ndcg_at_5(history, 0);
    let last = ndcg_at_5(history, history.len() - 1);
    assert!(last > first, "ndcg@5 went from {first} to {last}");

    // Scores from the trained model reproduce the recorded final metric.
    let scores = model.predict(set.features()).unwrap();
    let ndcg = Ndcg::new(vec![3, 5], LabelGain::default());
    let metrics = ndcg.evaluate(
        scores.as_slice().unwrap(),
        set.labels(),
        &set.groups(),
        Parallelism::Sequential,
    );
    assert_abs_diff_eq!(metrics[1].value, last, epsilon = 1e-9);
}

#[test]
fn zero_learning_rate_keeps_base_scores() {
    let set = synthetic_set(20, 6, 19);
    let dataset = BinnedDataset::from_features(set.features(), 255, Parallelism::Sequential);
    let gain = LabelGain::default();
    let params = GBDTParams {
        n_rounds: 5,
        learning_rate: 0.0,
        ..Default::default()
    };
    let trainer = GBDTTrainer::new(
        LambdaRankLoss::new(gain.clone(), 1.0, 30, true),
        Ndcg::new(vec![5], gain),
        params,
    );
    let output = trainer.train(&dataset, set.labels(), &set.groups(), Parallelism::Sequential);

    assert_eq!(output.forest.n_trees(), 5);
    let scores = output.forest.predict(set.features(), Parallelism::Sequential);
    for &s in scores.iter() {
        assert_abs_diff_eq!(s, output.forest.base_score(), epsilon = 0.0);
    }
}
