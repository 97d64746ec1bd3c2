//! Versioned feature schema.
//!
//! The ordered feature list is a contract shared by the export job that writes
//! feedback rows, the trainer, and the serving-side feature computation. It is
//! passed explicitly to every collaborator and recorded in the model artifact.

use serde::{Deserialize, Serialize};

/// Version tag of the built-in retrieval feature schema.
pub const RETRIEVAL_SCHEMA_VERSION: &str = "retrieval-v1";

/// Feature columns of the built-in retrieval schema, in model order.
pub const RETRIEVAL_FEATURES: [&str; 7] = [
    "f0_similarity",
    "f1_rank_score",
    "f2_authority",
    "f3_source_boost",
    "f4_crop_match",
    "f5_term_density",
    "f6_chunk_pos",
];

/// Errors raised while building or comparing feature schemas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("feature schema must name at least one feature")]
    Empty,

    #[error("feature `{0}` appears more than once in the schema")]
    DuplicateFeature(String),

    #[error("record source is missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("feature order mismatch: expected [{}], found [{}]", .expected.join(", "), .found.join(", "))]
    FeatureOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Ordered, versioned list of feature names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    version: String,
    features: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema, rejecting empty or duplicated feature lists.
    pub fn new(
        version: impl Into<String>,
        features: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, SchemaError> {
        let features: Vec<String> = features.into_iter().map(Into::into).collect();
        if features.is_empty() {
            return Err(SchemaError::Empty);
        }
        for (i, name) in features.iter().enumerate() {
            if features[..i].contains(name) {
                return Err(SchemaError::DuplicateFeature(name.clone()));
            }
        }
        Ok(Self {
            version: version.into(),
            features,
        })
    }

    /// The seven-feature schema used by the retrieval service.
    pub fn retrieval_v1() -> Self {
        Self {
            version: RETRIEVAL_SCHEMA_VERSION.to_string(),
            features: RETRIEVAL_FEATURES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Position of a feature in model order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f == name)
    }

    /// Fail when `found` does not list exactly this schema's features in order.
    pub fn check_order<S: AsRef<str>>(&self, found: &[S]) -> Result<(), SchemaError> {
        let same = found.len() == self.features.len()
            && found.iter().zip(&self.features).all(|(a, b)| a.as_ref() == b);
        if same {
            Ok(())
        } else {
            Err(SchemaError::FeatureOrder {
                expected: self.features.clone(),
                found: found.iter().map(|s| s.as_ref().to_string()).collect(),
            })
        }
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::retrieval_v1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_schema_order() {
        let schema = FeatureSchema::retrieval_v1();
        assert_eq!(schema.n_features(), 7);
        assert_eq!(schema.index_of("f0_similarity"), Some(0));
        assert_eq!(schema.index_of("f6_chunk_pos"), Some(6));
        assert_eq!(schema.version(), RETRIEVAL_SCHEMA_VERSION);
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        assert_eq!(
            FeatureSchema::new("v", ["a", "b", "a"]),
            Err(SchemaError::DuplicateFeature("a".into()))
        );
        assert_eq!(
            FeatureSchema::new("v", Vec::<String>::new()),
            Err(SchemaError::Empty)
        );
    }

    #[test]
    fn check_order_detects_swaps() {
        let schema = FeatureSchema::new("v", ["a", "b"]).unwrap();
        assert!(schema.check_order(&["a", "b"]).is_ok());
        assert!(matches!(
            schema.check_order(&["b", "a"]),
            Err(SchemaError::FeatureOrder { .. })
        ));
        assert!(schema.check_order(&["a"]).is_err());
    }
}
