//! LightGBM text model format.
//!
//! The serving side loads rankers with LightGBM's text loader, so models are
//! written in that line-based `key=value` format: a header, one `Tree=N`
//! block per tree, `end of trees`, then feature importances and parameters.
//! [`parse`] reads the same format back, including files written by LightGBM
//! itself as long as they hold a single-output numerical model.

use std::collections::HashMap;
use std::fmt::{Display, Write as _};
use std::str::FromStr;

use crate::model::RankingModel;
use crate::repr::TreeArrays;

/// LightGBM `decision_type` for a numerical split with default-left and no
/// missing-value handling (NaN is compared as 0).
const DECISION_TYPE_NUMERICAL: i8 = 2;

/// Bit flagging a categorical split in `decision_type`.
const DECISION_TYPE_CATEGORICAL: i8 = 1;

/// Upper bound on features accepted from a model file.
const MAX_FEATURES: usize = 1 << 20;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while parsing a LightGBM text model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("unsupported model: {0}")]
    Unsupported(String),
}

// =============================================================================
// Parsed model
// =============================================================================

/// Contents of a LightGBM text model relevant to ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LgbTextModel {
    pub objective: String,
    pub feature_names: Vec<String>,
    pub feature_infos: Vec<String>,
    pub trees: Vec<TreeArrays>,
    /// `[key: value]` lines of the `parameters:` block.
    pub parameters: HashMap<String, String>,
}

impl LgbTextModel {
    pub fn parameter<T: FromStr>(&self, key: &str) -> Option<T> {
        self.parameters.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Comma-separated list parameter, e.g. `eval_at: 3,5`.
    pub fn list_parameter<T: FromStr>(&self, key: &str) -> Option<Vec<T>> {
        let raw = self.parameters.get(key)?;
        raw.split(',')
            .map(|v| v.trim().parse().ok())
            .collect::<Option<Vec<T>>>()
    }
}

// =============================================================================
// Writer
// =============================================================================

fn join<T: Display>(values: impl IntoIterator<Item = T>, sep: &str) -> String {
    let mut out = String::new();
    for (i, v) in values.into_iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        let _ = write!(out, "{v}");
    }
    out
}

/// One `Tree=N` block, including its trailing blank lines.
fn tree_block(index: usize, tree: &TreeArrays) -> String {
    let n_leaves = tree.leaf_value.len();
    let mut s = String::new();
    let _ = writeln!(s, "Tree={index}");
    let _ = writeln!(s, "num_leaves={n_leaves}");
    let _ = writeln!(s, "num_cat=0");
    if n_leaves > 1 {
        let _ = writeln!(s, "split_feature={}", join(&tree.split_feature, " "));
        let _ = writeln!(s, "split_gain={}", join(&tree.split_gain, " "));
        let _ = writeln!(s, "threshold={}", join(&tree.threshold, " "));
        let decision = std::iter::repeat(DECISION_TYPE_NUMERICAL).take(n_leaves - 1);
        let _ = writeln!(s, "decision_type={}", join(decision, " "));
        let _ = writeln!(s, "left_child={}", join(&tree.left_child, " "));
        let _ = writeln!(s, "right_child={}", join(&tree.right_child, " "));
    }
    let _ = writeln!(s, "leaf_value={}", join(&tree.leaf_value, " "));
    if n_leaves > 1 {
        let _ = writeln!(s, "leaf_weight={}", join(&tree.leaf_weight, " "));
        let _ = writeln!(s, "leaf_count={}", join(&tree.leaf_count, " "));
        let _ = writeln!(s, "internal_value={}", join(&tree.internal_value, " "));
        let _ = writeln!(s, "internal_weight={}", join(&tree.internal_weight, " "));
        let _ = writeln!(s, "internal_count={}", join(&tree.internal_count, " "));
    }
    let _ = writeln!(s, "is_linear=0");
    let _ = writeln!(s, "shrinkage={}", tree.shrinkage);
    s.push('\n');
    s.push('\n');
    s
}

/// Render a model as LightGBM text.
pub fn to_string(model: &RankingModel) -> String {
    let meta = model.meta();
    let config = model.config();
    let features = meta.schema.features();
    let n_features = features.len();

    let blocks: Vec<String> = model
        .forest()
        .trees()
        .iter()
        .enumerate()
        .map(|(i, tree)| tree_block(i, tree.arrays()))
        .collect();

    let feature_infos = (0..n_features).map(|f| match meta.feature_ranges.get(f) {
        Some(Some((lo, hi))) => format!("[{lo}:{hi}]"),
        _ => "none".to_string(),
    });

    let mut out = String::new();
    let _ = writeln!(out, "tree");
    let _ = writeln!(out, "version=v4");
    let _ = writeln!(out, "num_class=1");
    let _ = writeln!(out, "num_tree_per_iteration=1");
    let _ = writeln!(out, "label_index=0");
    let _ = writeln!(out, "max_feature_idx={}", n_features.saturating_sub(1));
    let _ = writeln!(out, "objective={}", meta.objective);
    let _ = writeln!(out, "feature_names={}", join(features, " "));
    let _ = writeln!(out, "feature_infos={}", join(feature_infos, " "));
    let _ = writeln!(out, "tree_sizes={}", join(blocks.iter().map(String::len), " "));
    out.push('\n');
    for block in &blocks {
        out.push_str(block);
    }
    out.push_str("end of trees\n\n");

    let mut importances: Vec<(usize, u32)> = model
        .forest()
        .split_counts(n_features)
        .into_iter()
        .enumerate()
        .filter(|&(_, c)| c > 0)
        .collect();
    importances.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let _ = writeln!(out, "feature_importances:");
    for (f, count) in importances {
        let _ = writeln!(out, "{}={count}", features[f]);
    }
    out.push('\n');

    let _ = writeln!(out, "parameters:");
    let params: [(&str, String); 18] = [
        ("boosting", "gbdt".to_string()),
        ("objective", meta.objective.clone()),
        ("metric", meta.metric.clone()),
        ("feature_schema", meta.schema.version().to_string()),
        ("num_iterations", meta.n_rounds.to_string()),
        ("learning_rate", config.learning_rate.to_string()),
        ("num_leaves", config.max_leaves.to_string()),
        ("max_depth", config.max_depth.map_or(-1, i64::from).to_string()),
        ("min_data_in_leaf", config.min_data_in_leaf.to_string()),
        ("min_sum_hessian_in_leaf", config.min_sum_hessian_in_leaf.to_string()),
        ("lambda_l2", config.lambda_l2.to_string()),
        ("min_gain_to_split", config.min_gain_to_split.to_string()),
        ("max_bin", config.max_bins.to_string()),
        ("label_gain", join(meta.label_gain.as_slice(), ",")),
        ("eval_at", join(&meta.eval_at, ",")),
        ("lambdarank_truncation_level", config.truncation_level.to_string()),
        ("lambdarank_norm", u8::from(config.normalize_lambdas).to_string()),
        ("sigmoid", config.sigma.to_string()),
    ];
    for (key, value) in params {
        let _ = writeln!(out, "[{key}: {value}]");
    }
    let _ = writeln!(out, "end of parameters");
    out.push('\n');
    let _ = writeln!(out, "pandas_categorical:null");
    out
}

// =============================================================================
// Parser
// =============================================================================

fn parse_array<T: FromStr>(field: &'static str, raw: &str) -> Result<Vec<T>, ParseError> {
    raw.split_whitespace()
        .map(|v| {
            v.parse().map_err(|_| ParseError::InvalidValue {
                field,
                message: format!("cannot parse {v:?}"),
            })
        })
        .collect()
}

fn parse_scalar<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ParseError> {
    raw.trim().parse().map_err(|_| ParseError::InvalidValue {
        field,
        message: format!("cannot parse {raw:?}"),
    })
}

fn required<'a>(kv: &'a HashMap<&str, &str>, field: &'static str) -> Result<&'a str, ParseError> {
    kv.get(field).copied().ok_or(ParseError::MissingField(field))
}

fn optional_array<T: FromStr>(
    kv: &HashMap<&str, &str>,
    field: &'static str,
) -> Result<Vec<T>, ParseError> {
    kv.get(field)
        .map(|raw| parse_array(field, raw))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn parse_tree(kv: &HashMap<&str, &str>) -> Result<TreeArrays, ParseError> {
    let n_leaves: usize = parse_scalar("num_leaves", required(kv, "num_leaves")?)?;
    let n_cat: usize = kv
        .get("num_cat")
        .map(|v| parse_scalar("num_cat", v))
        .transpose()?
        .unwrap_or(0);
    if n_cat > 0 {
        return Err(ParseError::Unsupported("categorical splits".into()));
    }
    if kv.get("is_linear").is_some_and(|v| v.trim() != "0") {
        return Err(ParseError::Unsupported("linear trees".into()));
    }

    let shrinkage = kv
        .get("shrinkage")
        .map(|v| parse_scalar("shrinkage", v))
        .transpose()?
        .unwrap_or(1.0);
    let leaf_value = parse_array("leaf_value", required(kv, "leaf_value")?)?;

    if n_leaves <= 1 {
        return Ok(TreeArrays {
            leaf_value,
            shrinkage,
            ..Default::default()
        });
    }

    let decision_type: Vec<i8> = optional_array(kv, "decision_type")?;
    if decision_type.iter().any(|d| d & DECISION_TYPE_CATEGORICAL != 0) {
        return Err(ParseError::Unsupported("categorical splits".into()));
    }

    Ok(TreeArrays {
        split_feature: parse_array("split_feature", required(kv, "split_feature")?)?,
        split_gain: optional_array(kv, "split_gain")?,
        threshold: parse_array("threshold", required(kv, "threshold")?)?,
        left_child: parse_array("left_child", required(kv, "left_child")?)?,
        right_child: parse_array("right_child", required(kv, "right_child")?)?,
        internal_value: optional_array(kv, "internal_value")?,
        internal_weight: optional_array(kv, "internal_weight")?,
        internal_count: optional_array(kv, "internal_count")?,
        leaf_value,
        leaf_weight: optional_array(kv, "leaf_weight")?,
        leaf_count: optional_array(kv, "leaf_count")?,
        shrinkage,
    })
}

/// Parse LightGBM text. Tree arrays are returned unvalidated.
pub fn parse(content: &str) -> Result<LgbTextModel, ParseError> {
    let mut lines = content.lines().map(str::trim_end).peekable();
    let mut header: HashMap<&str, &str> = HashMap::new();

    // Header: everything before the first tree.
    while let Some(&line) = lines.peek() {
        if line.starts_with("Tree=") || line == "end of trees" {
            break;
        }
        lines.next();
        if let Some((key, value)) = line.split_once('=') {
            header.insert(key, value);
        }
    }

    let n_class: usize = header
        .get("num_class")
        .map(|v| parse_scalar("num_class", v))
        .transpose()?
        .unwrap_or(1);
    if n_class != 1 {
        return Err(ParseError::Unsupported(format!("{n_class} output classes")));
    }
    let max_feature_idx: usize = parse_scalar("max_feature_idx", required(&header, "max_feature_idx")?)?;
    if max_feature_idx >= MAX_FEATURES {
        return Err(ParseError::InvalidValue {
            field: "max_feature_idx",
            message: format!("{max_feature_idx} exceeds the limit of {MAX_FEATURES} features"),
        });
    }

    let mut model = LgbTextModel {
        objective: header
            .get("objective")
            .map(|o| o.split_whitespace().next().unwrap_or("").to_string())
            .unwrap_or_default(),
        feature_names: header
            .get("feature_names")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        feature_infos: header
            .get("feature_infos")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        ..Default::default()
    };
    if model.feature_names.is_empty() {
        model.feature_names = (0..=max_feature_idx).map(|i| format!("Column_{i}")).collect();
    }
    if model.feature_names.len() != max_feature_idx + 1 {
        return Err(ParseError::InvalidValue {
            field: "feature_names",
            message: format!(
                "{} names for max_feature_idx={max_feature_idx}",
                model.feature_names.len()
            ),
        });
    }

    // Trees.
    while let Some(line) = lines.next() {
        if line == "end of trees" {
            break;
        }
        if !line.starts_with("Tree=") {
            continue;
        }
        let mut kv: HashMap<&str, &str> = HashMap::new();
        while let Some(&next) = lines.peek() {
            if next.is_empty() || next.starts_with("Tree=") || next == "end of trees" {
                break;
            }
            lines.next();
            if let Some((key, value)) = next.split_once('=') {
                kv.insert(key, value);
            }
        }
        model.trees.push(parse_tree(&kv)?);
    }

    // Trailer: only the parameters block is read.
    let mut in_parameters = false;
    for line in lines {
        match line {
            "parameters:" => in_parameters = true,
            "end of parameters" => in_parameters = false,
            _ if in_parameters => {
                if let Some((key, value)) = line
                    .strip_prefix('[')
                    .and_then(|l| l.strip_suffix(']'))
                    .and_then(|l| l.split_once(':'))
                {
                    model
                        .parameters
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
            }
            _ => {}
        }
    }

    Ok(model)
}
