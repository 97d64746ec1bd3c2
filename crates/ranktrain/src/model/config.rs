//! Ranker configuration with builder pattern.
//!
//! [`RankerConfig`] gathers every knob of a training run. It is built with the
//! `bon` builder, whose `build()` validates, or deserialized from JSON and
//! checked with [`RankerConfig::validate`].
//!
//! # Example
//!
//! ```
//! use ranktrain::model::RankerConfig;
//!
//! let config = RankerConfig::builder()
//!     .n_rounds(100)
//!     .learning_rate(0.1)
//!     .eval_at(vec![1, 3, 10])
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_leaves, 31);
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::data::MAX_BINS;
use crate::training::gbdt::{GBDTParams, GainParams};
use crate::training::{LabelGain, LambdaRankLoss, Ndcg, Verbosity};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors raised by configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("learning_rate must be finite and positive, got {0}")]
    InvalidLearningRate(f64),

    #[error("n_rounds must be at least 1")]
    InvalidNRounds,

    #[error("max_leaves must be at least 2, got {0}")]
    InvalidMaxLeaves(usize),

    #[error("max_depth must be at least 1")]
    InvalidMaxDepth,

    #[error("min_data_in_leaf must be at least 1")]
    InvalidMinDataInLeaf,

    #[error("max_bins must be in 2..=256, got {0}")]
    InvalidMaxBins(usize),

    #[error("eval_at must list at least one cutoff, all >= 1, got {0:?}")]
    InvalidEvalAt(Vec<usize>),

    #[error("{field} must be finite and non-negative, got {value}")]
    InvalidRegularization { field: &'static str, value: f64 },

    #[error("sigma must be finite and positive, got {0}")]
    InvalidSigma(f64),

    #[error("truncation_level must be at least 1")]
    InvalidTruncationLevel,

    #[error("log_every must be at least 1")]
    InvalidLogEvery,

    #[error("failed to read config: {0}")]
    Parse(String),
}

// =============================================================================
// RankerConfig
// =============================================================================

/// Configuration of a LambdaRank training run.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
#[serde(default)]
pub struct RankerConfig {
    // === Boosting ===
    /// Boosting rounds. Default: 300.
    #[builder(default = 300)]
    pub n_rounds: usize,

    /// Shrinkage per tree. Default: 0.05.
    #[builder(default = 0.05)]
    pub learning_rate: f64,

    // === Tree structure ===
    /// Maximum leaves per tree. Default: 31.
    #[builder(default = 31)]
    pub max_leaves: usize,

    /// Optional depth limit.
    pub max_depth: Option<u32>,

    /// Minimum rows per leaf. Default: 5.
    #[builder(default = 5)]
    pub min_data_in_leaf: u32,

    /// Minimum hessian sum per leaf. Default: 1e-3.
    #[builder(default = 1e-3)]
    pub min_sum_hessian_in_leaf: f64,

    /// L2 regularization on leaf values. Default: 0.
    #[builder(default)]
    pub lambda_l2: f64,

    /// Minimum gain to accept a split. Default: 0.
    #[builder(default)]
    pub min_gain_to_split: f64,

    /// Histogram bins per feature. Default: 255.
    #[builder(default = 255)]
    pub max_bins: usize,

    // === Ranking objective ===
    /// Gain of each relevance label. Default: `[0, 1, 3]`.
    #[builder(default)]
    pub label_gain: LabelGain,

    /// NDCG cutoffs reported during training. Default: `[3, 5]`.
    #[builder(default = vec![3, 5])]
    pub eval_at: Vec<usize>,

    /// Sigmoid steepness of the pairwise loss. Default: 1.0.
    #[builder(default = 1.0)]
    pub sigma: f64,

    /// Only pairs with the upper document ranked above this position
    /// contribute gradients. Default: 30.
    #[builder(default = 30)]
    pub truncation_level: usize,

    /// Normalize pair weights by score distance and per-group lambda sum.
    /// Default: true.
    #[builder(default = true)]
    pub normalize_lambdas: bool,

    // === Runtime ===
    /// Evaluate and log metrics every this many rounds. Default: 50.
    #[builder(default = 50)]
    pub log_every: usize,

    /// Worker threads; 0 uses all cores. Default: 0.
    #[builder(default)]
    pub n_threads: usize,

    /// Training output level. Default: `Silent`.
    #[builder(default)]
    pub verbosity: Verbosity,
}

impl<S: ranker_config_builder::IsComplete> RankerConfigBuilder<S> {
    /// Build and validate the configuration.
    pub fn build(self) -> Result<RankerConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

impl RankerConfig {
    /// Check every parameter range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::InvalidLearningRate(self.learning_rate));
        }
        if self.n_rounds == 0 {
            return Err(ConfigError::InvalidNRounds);
        }
        if self.max_leaves < 2 {
            return Err(ConfigError::InvalidMaxLeaves(self.max_leaves));
        }
        if self.max_depth == Some(0) {
            return Err(ConfigError::InvalidMaxDepth);
        }
        if self.min_data_in_leaf == 0 {
            return Err(ConfigError::InvalidMinDataInLeaf);
        }
        if !(2..=MAX_BINS).contains(&self.max_bins) {
            return Err(ConfigError::InvalidMaxBins(self.max_bins));
        }
        if self.eval_at.is_empty() || self.eval_at.contains(&0) {
            return Err(ConfigError::InvalidEvalAt(self.eval_at.clone()));
        }
        for (field, value) in [
            ("lambda_l2", self.lambda_l2),
            ("min_gain_to_split", self.min_gain_to_split),
            ("min_sum_hessian_in_leaf", self.min_sum_hessian_in_leaf),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidRegularization { field, value });
            }
        }
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(ConfigError::InvalidSigma(self.sigma));
        }
        if self.truncation_level == 0 {
            return Err(ConfigError::InvalidTruncationLevel);
        }
        if self.log_every == 0 {
            return Err(ConfigError::InvalidLogEvery);
        }
        Ok(())
    }

    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn objective(&self) -> LambdaRankLoss {
        LambdaRankLoss::new(
            self.label_gain.clone(),
            self.sigma,
            self.truncation_level,
            self.normalize_lambdas,
        )
    }

    pub(crate) fn metric(&self) -> Ndcg {
        Ndcg::new(self.eval_at.clone(), self.label_gain.clone())
    }

    pub(crate) fn to_gbdt_params(&self) -> GBDTParams {
        GBDTParams {
            n_rounds: self.n_rounds,
            learning_rate: self.learning_rate,
            max_leaves: self.max_leaves,
            max_depth: self.max_depth,
            gain: GainParams {
                lambda_l2: self.lambda_l2,
                min_gain_to_split: self.min_gain_to_split,
                min_data_in_leaf: self.min_data_in_leaf,
                min_sum_hessian_in_leaf: self.min_sum_hessian_in_leaf,
            },
            log_every: self.log_every,
            verbosity: self.verbosity,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
