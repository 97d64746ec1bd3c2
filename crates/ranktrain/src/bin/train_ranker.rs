//! Retrain the retrieval ranker from exported feedback.
//!
//! # Usage
//!
//! ```bash
//! # Train with defaults (data/training_events.csv -> models/ranker/model.txt)
//! cargo run --release --bin train-ranker
//!
//! # Custom paths, JSON artifact, fewer rounds
//! cargo run --release --bin train-ranker -- \
//!     --input exports/events.csv --output models/ranker.json --rounds 100
//!
//! # Upload to S3 after training (requires the `s3` feature)
//! cargo run --release --features s3 --bin train-ranker -- \
//!     --s3-bucket models --s3-key ranker/model.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use ranktrain::distribute::{ArtifactDistributor, DistributionOutcome, RemoteDestination};
use ranktrain::model::RankerConfig;
use ranktrain::persist::ArtifactFormat;
use ranktrain::pipeline::{self, PipelineOptions, RunReport};
use ranktrain::training::Verbosity;
use ranktrain::FeatureSchema;
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "train-ranker")]
#[command(about = "Train a LambdaRank model from relevance feedback")]
struct Args {
    /// Feedback CSV with qid, label and feature columns
    #[arg(long, default_value = "data/training_events.csv")]
    input: PathBuf,

    /// Model artifact path; the directory is created if missing
    #[arg(long, default_value = "models/ranker/model.txt")]
    output: PathBuf,

    /// Artifact format (default: json for .json paths, lightgbm otherwise)
    #[arg(long, value_enum)]
    format: Option<ArtifactFormat>,

    /// S3 bucket to upload the model to
    #[arg(long, requires = "s3_key")]
    s3_bucket: Option<String>,

    /// S3 object key for the uploaded model
    #[arg(long, requires = "s3_bucket")]
    s3_key: Option<String>,

    /// JSON file with training parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Boosting rounds
    #[arg(long)]
    rounds: Option<usize>,

    /// Shrinkage applied to every tree
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Maximum leaves per tree
    #[arg(long)]
    num_leaves: Option<usize>,

    /// Minimum rows per leaf
    #[arg(long)]
    min_data_in_leaf: Option<u32>,

    /// Worker threads (0 = all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn log_filter(&self) -> EnvFilter {
        let default = match (self.verbose, self.quiet) {
            (true, _) => "debug",
            (_, true) => "warn",
            _ => "info",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    }

    fn verbosity(&self) -> Verbosity {
        match (self.verbose, self.quiet) {
            (true, _) => Verbosity::Debug,
            (_, true) => Verbosity::Warning,
            _ => Verbosity::Info,
        }
    }

    fn ranker_config(&self) -> anyhow::Result<RankerConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                RankerConfig::from_json(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => RankerConfig::default(),
        };
        if let Some(v) = self.rounds {
            config.n_rounds = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = self.num_leaves {
            config.max_leaves = v;
        }
        if let Some(v) = self.min_data_in_leaf {
            config.min_data_in_leaf = v;
        }
        if let Some(v) = self.threads {
            config.n_threads = v;
        }
        config.verbosity = self.verbosity();
        Ok(config)
    }
}

// =============================================================================
// Setup
// =============================================================================

fn prepare_paths(input: &Path, output: &Path) -> anyhow::Result<()> {
    if !input.is_file() {
        bail!("input file {} does not exist", input.display());
    }
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(feature = "s3")]
fn distributor() -> Option<Box<dyn ArtifactDistributor>> {
    match ranktrain::distribute::S3Distributor::from_env() {
        Ok(d) => Some(Box::new(d)),
        Err(err) => {
            tracing::warn!(error = %err, "S3 client could not be initialized");
            None
        }
    }
}

#[cfg(not(feature = "s3"))]
fn distributor() -> Option<Box<dyn ArtifactDistributor>> {
    None
}

fn report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    let metrics = report
        .final_metrics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!(
        artifact = %report.artifact.display(),
        n_trees = report.n_trees,
        n_groups = report.n_groups,
        skipped_groups = report.skipped_groups,
        "Training complete: {metrics}"
    );
    if !matches!(report.distribution, DistributionOutcome::Skipped) {
        tracing::info!("Distribution: {}", report.distribution);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}

fn run(args: &Args) -> anyhow::Result<()> {
    prepare_paths(&args.input, &args.output)?;

    let destination = RemoteDestination::from_parts(args.s3_bucket.clone(), args.s3_key.clone())?;
    let options = PipelineOptions {
        input: args.input.clone(),
        output: args.output.clone(),
        format: args.format,
        destination,
        config: args.ranker_config()?,
        schema: FeatureSchema::retrieval_v1(),
    };

    let distributor = match options.destination {
        Some(_) => distributor(),
        None => None,
    };
    let result = pipeline::run(&options, distributor.as_deref())
        .map_err(|e| anyhow::anyhow!("{} failed ({:?}): {e}", e.phase(), e.kind()))?;
    report(&result, args.json)
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter())
        .with_target(false)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
