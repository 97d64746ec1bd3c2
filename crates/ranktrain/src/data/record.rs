//! Typed feedback records and row parsing.
//!
//! A raw row is untyped text. [`RecordLayout`] resolves the column positions
//! once from the header, then [`RecordLayout::parse`] turns each row into a
//! [`FeedbackRecord`] or a [`RecordError::Malformed`] naming the field and line.
//! Values are never coerced: `1.0` is not a label and `nan` is not a feature.

use std::fmt;

use csv::StringRecord;

use crate::schema::{FeatureSchema, SchemaError};

/// Header names accepted for the query identifier column, in lookup order.
pub const QUERY_COLUMNS: [&str; 2] = ["qid", "query_id"];

/// Header name of the relevance label column.
pub const LABEL_COLUMN: &str = "label";

// =============================================================================
// Errors
// =============================================================================

/// Why a field failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Field is empty.
    Empty,
    /// Label is not an unsigned integer.
    NotAnInteger,
    /// Label is above the largest grade the gain table knows.
    LabelOutOfRange { max_label: u32 },
    /// Feature is not a decimal number.
    NotANumber,
    /// Feature parsed to NaN or an infinity.
    NonFinite,
    /// Row has a different number of fields than the header.
    FieldCount { expected: usize, found: usize },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "value is empty"),
            Self::NotAnInteger => write!(f, "expected an unsigned integer"),
            Self::LabelOutOfRange { max_label } => {
                write!(f, "label exceeds the largest known grade {max_label}")
            }
            Self::NotANumber => write!(f, "expected a decimal number"),
            Self::NonFinite => write!(f, "value is not finite"),
            Self::FieldCount { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
        }
    }
}

/// Errors raised while reading feedback records.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Required columns are absent from the record source.
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaError),

    /// A row failed to parse into the expected types.
    #[error("malformed record at line {line}: field `{field}` = {value:?}: {reason}")]
    Malformed {
        line: u64,
        field: String,
        value: String,
        reason: MalformedReason,
    },

    /// The underlying source could not be read.
    #[error("failed to read record source: {0}")]
    Read(#[source] csv::Error),
}

// =============================================================================
// FeedbackRecord
// =============================================================================

/// One judged (query, document) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub query_id: String,
    /// Ordinal relevance grade.
    pub label: u32,
    /// Feature values in schema order.
    pub features: Box<[f32]>,
}

impl FeedbackRecord {
    pub fn new(query_id: impl Into<String>, label: u32, features: impl Into<Box<[f32]>>) -> Self {
        Self {
            query_id: query_id.into(),
            label,
            features: features.into(),
        }
    }
}

// =============================================================================
// RecordLayout
// =============================================================================

/// Column positions of the query id, label and schema features in a source.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    query_col: usize,
    query_name: String,
    label_col: usize,
    feature_cols: Vec<usize>,
    feature_names: Vec<String>,
    n_columns: usize,
    max_label: u32,
}

impl RecordLayout {
    /// Resolve column positions from a header row.
    ///
    /// Every schema feature plus the query and label columns must be present;
    /// all missing names are reported together. Extra columns are ignored.
    pub fn from_headers<S: AsRef<str>>(
        headers: &[S],
        schema: &FeatureSchema,
        max_label: u32,
    ) -> Result<Self, SchemaError> {
        let position = |name: &str| headers.iter().position(|h| h.as_ref() == name);
        let mut missing = Vec::new();

        let query = QUERY_COLUMNS
            .iter()
            .find_map(|name| position(*name).map(|col| (col, name.to_string())));
        if query.is_none() {
            missing.push(QUERY_COLUMNS[0].to_string());
        }
        let label_col = position(LABEL_COLUMN);
        if label_col.is_none() {
            missing.push(LABEL_COLUMN.to_string());
        }

        let mut feature_cols = Vec::with_capacity(schema.n_features());
        for name in schema.features() {
            match position(name) {
                Some(col) => feature_cols.push(col),
                None => missing.push(name.clone()),
            }
        }

        match (query, label_col) {
            (Some((query_col, query_name)), Some(label_col)) if missing.is_empty() => Ok(Self {
                query_col,
                query_name,
                label_col,
                feature_cols,
                feature_names: schema.features().to_vec(),
                n_columns: headers.len(),
                max_label,
            }),
            _ => Err(SchemaError::MissingColumns { missing }),
        }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.feature_cols.len()
    }

    /// Parse one data row. `line` is the 1-based position in the source
    /// (the header is line 1).
    pub fn parse(&self, row: &StringRecord, line: u64) -> Result<FeedbackRecord, RecordError> {
        if row.len() != self.n_columns {
            return Err(RecordError::Malformed {
                line,
                field: "<row>".to_string(),
                value: String::new(),
                reason: MalformedReason::FieldCount {
                    expected: self.n_columns,
                    found: row.len(),
                },
            });
        }
        let field = |col: usize| row.get(col).unwrap_or("");
        let malformed = |name: &str, value: &str, reason| RecordError::Malformed {
            line,
            field: name.to_string(),
            value: value.to_string(),
            reason,
        };

        let query_id = field(self.query_col);
        if query_id.is_empty() {
            return Err(malformed(&self.query_name, query_id, MalformedReason::Empty));
        }

        let raw_label = field(self.label_col);
        let label = parse_label(raw_label, self.max_label)
            .map_err(|reason| malformed(LABEL_COLUMN, raw_label, reason))?;

        let mut features = Vec::with_capacity(self.feature_cols.len());
        for (&col, name) in self.feature_cols.iter().zip(&self.feature_names) {
            let raw = field(col);
            let value = parse_feature(raw).map_err(|reason| malformed(name, raw, reason))?;
            features.push(value);
        }

        Ok(FeedbackRecord::new(query_id, label, features))
    }
}

fn parse_label(raw: &str, max_label: u32) -> Result<u32, MalformedReason> {
    if raw.is_empty() {
        return Err(MalformedReason::Empty);
    }
    let label: u32 = raw.parse().map_err(|_| MalformedReason::NotAnInteger)?;
    if label > max_label {
        return Err(MalformedReason::LabelOutOfRange { max_label });
    }
    Ok(label)
}

fn parse_feature(raw: &str) -> Result<f32, MalformedReason> {
    if raw.is_empty() {
        return Err(MalformedReason::Empty);
    }
    let value: f32 = raw.parse().map_err(|_| MalformedReason::NotANumber)?;
    if !value.is_finite() {
        return Err(MalformedReason::NonFinite);
    }
    Ok(value)
}
