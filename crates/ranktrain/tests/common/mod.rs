//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use ranktrain::data::{prepare_records, TrainingSet};
use ranktrain::model::RankerConfig;
use ranktrain::testing::{feedback_csv, synthetic_feedback};
use ranktrain::FeatureSchema;

/// Small, fast, single-threaded configuration.
pub fn fast_config(n_rounds: usize) -> RankerConfig {
    RankerConfig::builder()
        .n_rounds(n_rounds)
        .learning_rate(0.1)
        .max_leaves(8)
        .min_data_in_leaf(2)
        .log_every(5)
        .n_threads(1)
        .build()
        .expect("valid test config")
}

/// Write `content` to `name` inside `dir`.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write fixture");
    path
}

/// Synthetic feedback written as CSV under `dir`.
pub fn synthetic_csv(dir: &Path, n_queries: usize, docs_per_query: usize, seed: u64) -> PathBuf {
    let records = synthetic_feedback(n_queries, docs_per_query, seed);
    let csv = feedback_csv(&records, &FeatureSchema::retrieval_v1()).expect("render csv");
    write_file(dir, "training_events.csv", &csv)
}

/// Synthetic training set over the retrieval schema.
pub fn synthetic_set(n_queries: usize, docs_per_query: usize, seed: u64) -> TrainingSet {
    let records = synthetic_feedback(n_queries, docs_per_query, seed);
    prepare_records(records, &FeatureSchema::retrieval_v1())
        .expect("synthetic data has ranking signal")
        .training_set
}
