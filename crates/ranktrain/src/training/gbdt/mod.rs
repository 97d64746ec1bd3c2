//! Histogram-based gradient boosted decision trees.

mod grower;
mod histogram;
mod partition;
mod split;
mod trainer;

pub use grower::{GrowerParams, TreeGrower};
pub use histogram::{Histogram, HistogramBin};
pub use partition::{LeafId, RowPartitioner};
pub use split::{find_best_split, GainParams, LeafStats, SplitInfo};
pub use trainer::{GBDTParams, GBDTTrainer, RoundMetrics, TrainOutput};
