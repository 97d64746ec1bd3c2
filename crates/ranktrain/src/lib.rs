//! ranktrain: learning-to-rank training for retrieval.
//!
//! Turns flat relevance-feedback rows into grouped ranking training sets and
//! fits a LambdaRank gradient-boosted tree ensemble that optimizes NDCG. The
//! trained model is written as a LightGBM text model (or JSON) and can be
//! copied to remote storage.

pub mod data;
pub mod distribute;
pub mod error;
pub mod model;
pub mod persist;
pub mod pipeline;
pub mod repr;
pub mod schema;
pub mod testing;
pub mod training;
pub mod utils;

pub use error::{Error, ErrorKind, Phase};
pub use model::{RankerConfig, RankerTrainer, RankingModel};
pub use schema::FeatureSchema;
pub use utils::{run_with_threads, Parallelism};
