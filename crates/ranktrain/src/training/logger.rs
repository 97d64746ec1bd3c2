//! Training progress logging.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::metric::MetricValue;

/// How much training output to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    #[default]
    Silent,
    Warning,
    Info,
    Debug,
}

/// Emits training progress through `tracing`, gated by [`Verbosity`].
#[derive(Debug)]
pub struct TrainingLogger {
    verbosity: Verbosity,
    started: Option<Instant>,
    n_rounds: usize,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            started: None,
            n_rounds: 0,
        }
    }

    #[inline]
    pub fn enabled(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }

    pub fn start_training(&mut self, n_rows: usize, n_groups: usize, n_features: usize, n_rounds: usize) {
        self.started = Some(Instant::now());
        self.n_rounds = n_rounds;
        if self.enabled(Verbosity::Info) {
            tracing::info!(
                n_rows,
                n_groups,
                n_features,
                n_rounds,
                "Training LambdaRank: {n_rows} samples, {n_groups} queries, {n_features} features, {n_rounds} rounds"
            );
        }
    }

    /// Log metrics of a 0-based round.
    pub fn log_metrics(&self, round: usize, metrics: &[MetricValue]) {
        if !self.enabled(Verbosity::Info) || metrics.is_empty() {
            return;
        }
        let line = metrics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("  ");
        tracing::info!(round = round + 1, n_rounds = self.n_rounds, "[{}] train {line}", round + 1);
    }

    pub fn log_tree(&self, round: usize, n_leaves: usize) {
        if self.enabled(Verbosity::Debug) {
            tracing::debug!(round = round + 1, n_leaves, "grew tree");
        }
    }

    pub fn finish_training(&self, n_trees: usize) {
        if self.enabled(Verbosity::Info) {
            let elapsed = self.started.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0);
            tracing::info!(n_trees, elapsed_secs = elapsed, "training finished in {elapsed:.2}s");
        }
    }
}
