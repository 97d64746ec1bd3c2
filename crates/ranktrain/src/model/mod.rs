//! High-level ranker API: configuration, training and the trained model.
//!
//! ```no_run
//! use ranktrain::data::{prepare, CsvRecordReader};
//! use ranktrain::model::{RankerConfig, RankerTrainer};
//! use ranktrain::FeatureSchema;
//!
//! let schema = FeatureSchema::retrieval_v1();
//! let config = RankerConfig::default();
//! let reader =
//!     CsvRecordReader::from_path("training_events.csv", &schema, config.label_gain.max_label())?;
//! let prepared = prepare(reader, &schema)?;
//! let model = RankerTrainer::new(config)?.train(&prepared.training_set)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod ranker;

pub use config::{ConfigError, RankerConfig, RankerConfigBuilder};
pub use ranker::{ModelMeta, RankerTrainer, RankingModel, TrainError};
