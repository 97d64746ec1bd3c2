//! Feedback ingestion and training-set preparation.
//!
//! - [`record`]: typed rows and parsing
//! - [`reader`]: CSV record source
//! - [`prepare`]: grouping and the ranking-signal filter
//! - [`binned`]: feature quantization for training

pub mod binned;
mod groups;
pub mod prepare;
pub mod reader;
pub mod record;

pub use binned::{BinMapper, BinnedDataset, MAX_BINS};
pub use groups::QueryGroups;
pub use prepare::{prepare, prepare_records, PrepareError, PreparedData, TrainingSet, TrainingSetError};
pub use reader::CsvRecordReader;
pub use record::{FeedbackRecord, MalformedReason, RecordError, RecordLayout, LABEL_COLUMN, QUERY_COLUMNS};
