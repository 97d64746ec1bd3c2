//! Model artifacts: LightGBM text (default) and JSON.
//!
//! Writes are atomic. The artifact is written to a temporary file in the
//! destination directory, synced, then renamed over the target, so a failed
//! write never leaves a partial model behind.

pub mod lightgbm;
mod schema;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::model::{ModelMeta, RankerConfig, RankingModel};
use crate::repr::{Forest, ForestError, Tree};
use crate::schema::{FeatureSchema, SchemaError};
use crate::training::{LabelGain, Verbosity};

pub use lightgbm::{LgbTextModel, ParseError};
pub use schema::{ModelSchema, FORMAT_VERSION};

/// Feature-schema version recorded for LightGBM files that carry none.
const UNVERSIONED_SCHEMA: &str = "unversioned";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write model artifact to {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode model: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode JSON model: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to parse LightGBM model: {0}")]
    Parse(#[from] ParseError),

    #[error("unsupported JSON model format version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid feature schema in model: {0}")]
    Schema(#[from] SchemaError),

    #[error("invalid model: {0}")]
    Invalid(#[from] ForestError),
}

// =============================================================================
// Format
// =============================================================================

/// On-disk artifact format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ArtifactFormat {
    /// LightGBM's text model format.
    #[default]
    #[value(name = "lightgbm")]
    LightGbmText,
    /// JSON with full metadata and configuration.
    Json,
}

impl ArtifactFormat {
    /// `.json` paths are JSON; everything else is LightGBM text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::LightGbmText,
        }
    }
}

// =============================================================================
// Save / load
// =============================================================================

/// Write `bytes` to `path` atomically.
///
/// The parent directory must exist.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let write_err = |source| PersistError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".model-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Serialize `model` in `format`.
pub fn encode(model: &RankingModel, format: ArtifactFormat) -> Result<Vec<u8>, PersistError> {
    match format {
        ArtifactFormat::LightGbmText => Ok(lightgbm::to_string(model).into_bytes()),
        ArtifactFormat::Json => {
            serde_json::to_vec_pretty(&ModelSchema::from(model)).map_err(PersistError::Encode)
        }
    }
}

/// Save `model` to `path` atomically.
pub fn save_model(
    model: &RankingModel,
    path: &Path,
    format: ArtifactFormat,
) -> Result<(), PersistError> {
    let bytes = encode(model, format)?;
    write_atomic(path, &bytes)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), ?format, "model artifact written");
    Ok(())
}

/// Load a model saved in either format. JSON is detected by content.
pub fn load_model(path: &Path) -> Result<RankingModel, PersistError> {
    let content = fs::read_to_string(path).map_err(|source| PersistError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&content)
}

/// Decode a model from text in either format.
pub fn decode(content: &str) -> Result<RankingModel, PersistError> {
    if content.trim_start().starts_with('{') {
        let schema: ModelSchema = serde_json::from_str(content).map_err(PersistError::Decode)?;
        RankingModel::try_from(schema)
    } else {
        from_lightgbm(lightgbm::parse(content)?)
    }
}

/// Rebuild a model from parsed LightGBM text.
///
/// Training parameters missing from the file fall back to defaults.
pub fn from_lightgbm(text: LgbTextModel) -> Result<RankingModel, PersistError> {
    let defaults = RankerConfig::default();
    let label_gain = text
        .list_parameter::<f64>("label_gain")
        .and_then(|g| LabelGain::new(g).ok())
        .unwrap_or_else(|| defaults.label_gain.clone());
    let eval_at = text
        .list_parameter("eval_at")
        .unwrap_or_else(|| defaults.eval_at.clone());

    let config = RankerConfig {
        n_rounds: text.parameter("num_iterations").unwrap_or(text.trees.len()),
        learning_rate: text.parameter("learning_rate").unwrap_or(defaults.learning_rate),
        max_leaves: text.parameter("num_leaves").unwrap_or(defaults.max_leaves),
        max_depth: text
            .parameter::<i64>("max_depth")
            .and_then(|d| u32::try_from(d).ok())
            .filter(|&d| d > 0),
        min_data_in_leaf: text.parameter("min_data_in_leaf").unwrap_or(defaults.min_data_in_leaf),
        min_sum_hessian_in_leaf: text
            .parameter("min_sum_hessian_in_leaf")
            .unwrap_or(defaults.min_sum_hessian_in_leaf),
        lambda_l2: text.parameter("lambda_l2").unwrap_or(defaults.lambda_l2),
        min_gain_to_split: text.parameter("min_gain_to_split").unwrap_or(defaults.min_gain_to_split),
        max_bins: text.parameter("max_bin").unwrap_or(defaults.max_bins),
        label_gain: label_gain.clone(),
        eval_at: eval_at.clone(),
        sigma: text.parameter("sigmoid").unwrap_or(defaults.sigma),
        truncation_level: text
            .parameter("lambdarank_truncation_level")
            .unwrap_or(defaults.truncation_level),
        normalize_lambdas: text
            .parameter::<u8>("lambdarank_norm")
            .map_or(defaults.normalize_lambdas, |v| v != 0),
        log_every: defaults.log_every,
        n_threads: defaults.n_threads,
        verbosity: Verbosity::default(),
    };

    let version = text
        .parameters
        .get("feature_schema")
        .cloned()
        .unwrap_or_else(|| UNVERSIONED_SCHEMA.to_string());
    let schema = FeatureSchema::new(version, text.feature_names.iter().cloned())?;

    let feature_ranges = text
        .feature_infos
        .iter()
        .map(String::as_str)
        .map(parse_feature_info)
        .collect();

    let mut forest = Forest::new(0.0);
    for (tree_idx, arrays) in text.trees.into_iter().enumerate() {
        let tree = Tree::from_arrays(arrays)
            .map_err(|error| ForestError::InvalidTree { tree_idx, error })?;
        forest.push_tree(tree);
    }

    let meta = ModelMeta {
        schema,
        n_rounds: forest.n_trees(),
        objective: text.objective,
        metric: text
            .parameters
            .get("metric")
            .cloned()
            .unwrap_or_else(|| "ndcg".to_string()),
        eval_at,
        label_gain,
        training_metrics: Vec::new(),
        n_rows: 0,
        n_groups: 0,
        feature_ranges,
    };
    Ok(RankingModel::from_parts(forest, meta, config)?)
}

/// `[min:max]` → `Some((min, max))`; `none` or anything else → `None`.
fn parse_feature_info(info: &str) -> Option<(f64, f64)> {
    let (lo, hi) = info.strip_prefix('[')?.strip_suffix(']')?.split_once(':')?;
    Some((lo.parse().ok()?, hi.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(ArtifactFormat::from_path(Path::new("m.json")), ArtifactFormat::Json);
        assert_eq!(ArtifactFormat::from_path(Path::new("m.JSON")), ArtifactFormat::Json);
        assert_eq!(ArtifactFormat::from_path(Path::new("m.txt")), ArtifactFormat::LightGbmText);
        assert_eq!(ArtifactFormat::from_path(Path::new("model")), ArtifactFormat::LightGbmText);
    }

    #[test]
    fn feature_info_parsing() {
        assert_eq!(parse_feature_info("[0:1.5]"), Some((0.0, 1.5)));
        assert_eq!(parse_feature_info("[-2:3]"), Some((-2.0, 3.0)));
        assert_eq!(parse_feature_info("none"), None);
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.txt");
        fs::write(&path, "old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn atomic_write_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("model.txt");
        let err = write_atomic(&path, b"x").unwrap_err();
        assert!(matches!(err, PersistError::ArtifactWrite { .. }));
        assert!(!path.exists());
    }
}
