//! Training infrastructure: gradients, objectives, metrics and the GBDT engine.
//!
//! # Key Types
//!
//! - [`Gradients`]: per-row gradient and hessian buffers
//! - [`LabelGain`]: relevance label to gain mapping
//! - [`ObjectiveFn`], [`LambdaRankLoss`]: pairwise ranking objective
//! - [`MetricFn`], [`Ndcg`]: ranking metric at cutoffs
//! - [`TrainingLogger`], [`Verbosity`]: progress logging
//! - [`gbdt::GBDTTrainer`]: the boosting loop

pub mod gbdt;
mod gain;
mod gradients;
mod logger;
mod metric;
mod objective;

pub use gain::{GainError, LabelGain};
pub use gradients::{Gradients, GroupGradients};
pub use logger::{TrainingLogger, Verbosity};
pub use metric::{discount, rank_by_score, MetricFn, MetricValue, Ndcg};
pub use objective::{LambdaRankLoss, ObjectiveFn};
