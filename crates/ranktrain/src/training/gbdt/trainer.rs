//! GBDT training loop.
//!
//! Orchestrates gradient computation, tree growth and score updates. Use
//! [`GBDTTrainer::train`] to fit a forest on a binned dataset. Parameters here
//! are taken as given; range checks live in the high-level config.

use serde::{Deserialize, Serialize};

use super::grower::{GrowerParams, TreeGrower};
use super::split::GainParams;
use crate::data::{BinnedDataset, QueryGroups};
use crate::repr::Forest;
use crate::training::logger::{TrainingLogger, Verbosity};
use crate::training::metric::{MetricFn, MetricValue};
use crate::training::objective::ObjectiveFn;
use crate::training::Gradients;
use crate::utils::Parallelism;

// =============================================================================
// GBDTParams
// =============================================================================

/// Parameters for GBDT training.
#[derive(Clone, Debug)]
pub struct GBDTParams {
    /// Number of boosting rounds (one tree each).
    pub n_rounds: usize,
    /// Shrinkage applied to every tree.
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub max_depth: Option<u32>,
    pub gain: GainParams,
    /// Evaluate and log the metric every this many rounds, and after the last.
    pub log_every: usize,
    pub verbosity: Verbosity,
}

impl Default for GBDTParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.1,
            max_leaves: 31,
            max_depth: None,
            gain: GainParams::default(),
            log_every: 50,
            verbosity: Verbosity::default(),
        }
    }
}

impl GBDTParams {
    fn to_grower_params(&self) -> GrowerParams {
        GrowerParams {
            gain: self.gain.clone(),
            max_leaves: self.max_leaves,
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
        }
    }
}

/// Training-set metrics recorded after a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    /// 1-based round number.
    pub round: usize,
    pub metrics: Vec<MetricValue>,
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub forest: Forest,
    pub history: Vec<RoundMetrics>,
}

// =============================================================================
// GBDTTrainer
// =============================================================================

/// Gradient boosting trainer over grouped data.
pub struct GBDTTrainer<O: ObjectiveFn, M: MetricFn> {
    objective: O,
    metric: M,
    params: GBDTParams,
}

impl<O: ObjectiveFn, M: MetricFn> GBDTTrainer<O, M> {
    pub fn new(objective: O, metric: M, params: GBDTParams) -> Self {
        Self {
            objective,
            metric,
            params,
        }
    }

    /// Train for exactly `n_rounds` rounds.
    ///
    /// Rows of `dataset`, `labels` and `groups` must line up.
    pub fn train(
        &self,
        dataset: &BinnedDataset,
        labels: &[u32],
        groups: &QueryGroups,
        parallelism: Parallelism,
    ) -> TrainOutput {
        let n_rows = dataset.n_rows();
        debug_assert_eq!(labels.len(), n_rows);
        debug_assert_eq!(groups.n_rows(), n_rows);

        let base_score = self.objective.base_score(labels, groups);
        let mut scores = vec![base_score; n_rows];
        let mut forest = Forest::new(base_score);
        let mut gradients = Gradients::new(n_rows);
        let mut grower = TreeGrower::new(dataset, self.params.to_grower_params());
        let mut history = Vec::new();

        let mut logger = TrainingLogger::new(self.params.verbosity);
        logger.start_training(n_rows, groups.n_groups(), dataset.n_features(), self.params.n_rounds);

        let log_every = self.params.log_every.max(1);
        for round in 0..self.params.n_rounds {
            self.objective
                .compute_gradients(&scores, labels, groups, &mut gradients, parallelism);

            let tree = grower.grow(dataset, &gradients, parallelism);
            grower.update_predictions(&mut scores);
            logger.log_tree(round, tree.n_leaves());
            forest.push_tree(tree);

            let completed = round + 1;
            if completed % log_every == 0 || completed == self.params.n_rounds {
                let metrics = self.metric.evaluate(&scores, labels, groups, parallelism);
                logger.log_metrics(round, &metrics);
                history.push(RoundMetrics {
                    round: completed,
                    metrics,
                });
            }
        }

        logger.finish_training(forest.n_trees());
        TrainOutput { forest, history }
    }
}
