//! Ranker training state machine and the trained model.
//!
//! [`RankerTrainer`] is the configured state: inputs validated, nothing run.
//! [`RankerTrainer::train`] consumes it and yields a [`RankingModel`], the
//! trained state. A failed run yields no model.

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::config::{ConfigError, RankerConfig};
use crate::data::{BinnedDataset, TrainingSet, TrainingSetError};
use crate::repr::Forest;
use crate::schema::{FeatureSchema, SchemaError};
use crate::training::gbdt::{GBDTTrainer, RoundMetrics};
use crate::training::{LabelGain, MetricFn, MetricValue, ObjectiveFn};
use crate::utils::{run_with_threads, Parallelism};

// =============================================================================
// TrainError
// =============================================================================

/// Errors raised before or during training.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("invalid training set: {0}")]
    InvalidTrainingSet(#[from] TrainingSetError),

    #[error("invalid training set: label {label} has no gain (gain table covers 0..={max_label})")]
    LabelWithoutGain { label: u32, max_label: u32 },
}

// =============================================================================
// ModelMeta
// =============================================================================

/// What a model was trained on and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Features in the order the trees index them.
    pub schema: FeatureSchema,
    /// Boosting rounds completed.
    pub n_rounds: usize,
    pub objective: String,
    pub metric: String,
    pub eval_at: Vec<usize>,
    pub label_gain: LabelGain,
    /// Training-set metrics, one entry per logged round.
    #[serde(default)]
    pub training_metrics: Vec<RoundMetrics>,
    #[serde(default)]
    pub n_rows: usize,
    #[serde(default)]
    pub n_groups: usize,
    /// Observed `(min, max)` per feature; `None` when a feature never varied.
    #[serde(default)]
    pub feature_ranges: Vec<Option<(f64, f64)>>,
}

// =============================================================================
// RankingModel
// =============================================================================

/// A trained LambdaRank ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingModel {
    forest: Forest,
    meta: ModelMeta,
    config: RankerConfig,
}

impl RankingModel {
    /// Assemble a model from parts, checking the trees against the schema.
    pub fn from_parts(
        forest: Forest,
        meta: ModelMeta,
        config: RankerConfig,
    ) -> Result<Self, crate::repr::ForestError> {
        forest.validate(meta.schema.n_features())?;
        Ok(Self {
            forest,
            meta,
            config,
        })
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.meta.schema
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    /// Metrics of the last logged round.
    pub fn final_metrics(&self) -> Option<&[MetricValue]> {
        self.meta
            .training_metrics
            .last()
            .map(|r| r.metrics.as_slice())
    }

    /// Fail unless this model was trained on exactly `expected`'s feature order.
    pub fn check_schema(&self, expected: &FeatureSchema) -> Result<(), SchemaError> {
        expected.check_order(self.meta.schema.features())
    }

    /// Score one row given in schema order.
    pub fn predict_row(&self, row: &[f32]) -> Result<f64, SchemaError> {
        self.check_width(row.len())?;
        Ok(self.forest.predict_row(row))
    }

    /// Score a `[n_rows, n_features]` matrix in schema order.
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<f64>, SchemaError> {
        self.check_width(features.ncols())?;
        let parallelism = Parallelism::from_threads(self.config.n_threads);
        Ok(self.forest.predict(features, parallelism))
    }

    fn check_width(&self, width: usize) -> Result<(), SchemaError> {
        if width == self.meta.schema.n_features() {
            return Ok(());
        }
        Err(SchemaError::FeatureOrder {
            expected: self.meta.schema.features().to_vec(),
            found: (0..width).map(|i| format!("column {i}")).collect(),
        })
    }
}

// =============================================================================
// RankerTrainer
// =============================================================================

/// A validated, not yet run, training job.
#[derive(Debug, Clone)]
pub struct RankerTrainer {
    config: RankerConfig,
}

impl RankerTrainer {
    /// Validate the configuration. No training work happens here.
    pub fn new(config: RankerConfig) -> Result<Self, TrainError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Run all boosting rounds on `set`.
    pub fn train(self, set: &TrainingSet) -> Result<RankingModel, TrainError> {
        set.validate()?;
        let max_label = self.config.label_gain.max_label();
        if let Some(&label) = set.labels().iter().find(|&&l| l > max_label) {
            return Err(TrainError::LabelWithoutGain { label, max_label });
        }

        let config = &self.config;
        let groups = set.groups();
        let objective = config.objective();
        let metric = config.metric();
        let meta_names = (objective.name().to_string(), metric.name().to_string());

        let (output, feature_ranges) = run_with_threads(config.n_threads, |parallelism| {
            let dataset = BinnedDataset::from_features(set.features(), config.max_bins, parallelism);
            let ranges = dataset
                .bin_mappers()
                .iter()
                .map(|m| (!m.is_trivial()).then(|| (m.min_value(), m.max_value())))
                .collect::<Vec<_>>();
            let trainer = GBDTTrainer::new(objective, metric, config.to_gbdt_params());
            (trainer.train(&dataset, set.labels(), &groups, parallelism), ranges)
        });

        let meta = ModelMeta {
            schema: set.schema().clone(),
            n_rounds: output.forest.n_trees(),
            objective: meta_names.0,
            metric: meta_names.1,
            eval_at: config.eval_at.clone(),
            label_gain: config.label_gain.clone(),
            training_metrics: output.history,
            n_rows: set.n_rows(),
            n_groups: set.n_groups(),
            feature_ranges,
        };

        Ok(RankingModel {
            forest: output.forest,
            meta,
            config: self.config,
        })
    }
}
