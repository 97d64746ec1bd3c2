//! End-to-end retraining run: load, prepare, train, persist, distribute.
//!
//! Every phase before persisting is fatal on failure and leaves no artifact.
//! Distribution runs last and is best effort.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use crate::data::{prepare, CsvRecordReader};
use crate::distribute::{self, ArtifactDistributor, DistributionOutcome, RemoteDestination};
use crate::error::Error;
use crate::model::{RankerConfig, RankerTrainer};
use crate::persist::{save_model, ArtifactFormat};
use crate::schema::FeatureSchema;
use crate::training::MetricValue;

/// Inputs of one retraining run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Feedback CSV.
    pub input: PathBuf,
    /// Final artifact path; its directory must exist.
    pub output: PathBuf,
    /// Artifact format; inferred from `output` when `None`.
    pub format: Option<ArtifactFormat>,
    pub destination: Option<RemoteDestination>,
    pub config: RankerConfig,
    pub schema: FeatureSchema,
}

impl PipelineOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            format: None,
            destination: None,
            config: RankerConfig::default(),
            schema: FeatureSchema::retrieval_v1(),
        }
    }

    pub fn artifact_format(&self) -> ArtifactFormat {
        self.format
            .unwrap_or_else(|| ArtifactFormat::from_path(&self.output))
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub n_records: usize,
    pub n_rows: usize,
    pub n_groups: usize,
    pub skipped_groups: usize,
    pub n_trees: usize,
    pub final_metrics: Vec<MetricValue>,
    pub artifact: PathBuf,
    pub distribution: DistributionOutcome,
}

/// Run the whole pipeline.
///
/// `distributor` is only consulted when `options.destination` is set; `None`
/// with a destination yields [`DistributionOutcome::Unavailable`].
pub fn run(
    options: &PipelineOptions,
    distributor: Option<&dyn ArtifactDistributor>,
) -> Result<RunReport, Error> {
    let started = Instant::now();
    let trainer = RankerTrainer::new(options.config.clone())?;
    let max_label = trainer.config().label_gain.max_label();

    tracing::info!(input = %options.input.display(), schema = options.schema.version(), "Loading feedback records");
    let reader = CsvRecordReader::from_path(&options.input, &options.schema, max_label)?;
    let prepared = prepare(reader, &options.schema)?;
    let set = &prepared.training_set;

    let model = trainer.train(set)?;

    let format = options.artifact_format();
    save_model(&model, &options.output, format)?;
    tracing::info!(path = %options.output.display(), ?format, "Saved ranking model");

    let distribution = distribute::best_effort(
        &options.output,
        options.destination.as_ref(),
        distributor,
    );

    let report = RunReport {
        n_records: prepared.n_records,
        n_rows: set.n_rows(),
        n_groups: set.n_groups(),
        skipped_groups: prepared.skipped_groups,
        n_trees: model.n_trees(),
        final_metrics: model.final_metrics().map(<[_]>::to_vec).unwrap_or_default(),
        artifact: options.output.clone(),
        distribution,
    };
    tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "pipeline finished");
    Ok(report)
}
