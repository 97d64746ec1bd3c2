//! Query grouping and the ranking-signal filter.
//!
//! Feedback rows arrive flat and in any order. [`prepare`] groups them by query
//! id (first appearance decides group order, arrival order is kept inside a
//! group), drops every group whose records all share one label, and flattens
//! the survivors into a [`TrainingSet`].

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2};

use super::groups::QueryGroups;
use super::record::{FeedbackRecord, RecordError};
use crate::schema::FeatureSchema;

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while preparing a training set.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A record carries a different number of features than the schema.
    #[error("record for query `{query_id}` has {found} features, schema `{version}` expects {expected}")]
    FeatureCount {
        query_id: String,
        version: String,
        expected: usize,
        found: usize,
    },

    /// Nothing is left to train on.
    #[error(
        "no usable training data after filtering ({n_records} records, {skipped_groups} \
         single-label queries skipped); collect more feedback events before retraining"
    )]
    NoUsableData {
        n_records: usize,
        skipped_groups: usize,
    },
}

/// Violations of the [`TrainingSet`] invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrainingSetError {
    #[error("training set has no query groups")]
    NoGroups,

    #[error("row count mismatch: {features} feature rows, {labels} labels, group sizes sum to {groups}")]
    RowCount {
        features: usize,
        labels: usize,
        groups: usize,
    },

    #[error("feature matrix has {found} columns, schema expects {expected}")]
    FeatureCount { expected: usize, found: usize },

    #[error("group {group} has {size} rows, at least 2 are required")]
    GroupTooSmall { group: usize, size: u32 },

    #[error("group {group} has a single distinct label")]
    UniformLabels { group: usize },
}

// =============================================================================
// TrainingSet
// =============================================================================

/// Flattened, grouped ranking data.
///
/// Rows of one query are contiguous; `group_sizes[g]` rows belong to group `g`
/// and groups appear in the same order in features, labels and sizes.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    features: Array2<f32>,
    labels: Vec<u32>,
    group_sizes: Vec<u32>,
    query_ids: Vec<String>,
    schema: FeatureSchema,
}

impl TrainingSet {
    /// Assemble a training set from parts.
    ///
    /// No invariant is checked here; call [`validate`](Self::validate) before
    /// handing externally built sets to the trainer. Sets produced by
    /// [`prepare`] are always valid.
    pub fn new(
        features: Array2<f32>,
        labels: Vec<u32>,
        group_sizes: Vec<u32>,
        schema: FeatureSchema,
    ) -> Self {
        let query_ids = (0..group_sizes.len()).map(|g| format!("group-{g}")).collect();
        Self {
            features,
            labels,
            group_sizes,
            query_ids,
            schema,
        }
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), TrainingSetError> {
        if self.group_sizes.is_empty() {
            return Err(TrainingSetError::NoGroups);
        }
        let grouped: usize = self.group_sizes.iter().map(|&s| s as usize).sum();
        if self.features.nrows() != self.labels.len() || grouped != self.labels.len() {
            return Err(TrainingSetError::RowCount {
                features: self.features.nrows(),
                labels: self.labels.len(),
                groups: grouped,
            });
        }
        if self.features.ncols() != self.schema.n_features() {
            return Err(TrainingSetError::FeatureCount {
                expected: self.schema.n_features(),
                found: self.features.ncols(),
            });
        }
        for (group, range) in self.groups().iter().enumerate() {
            let size = self.group_sizes[group];
            if size < 2 {
                return Err(TrainingSetError::GroupTooSmall { group, size });
            }
            let labels = &self.labels[range];
            if labels.iter().all(|&l| l == labels[0]) {
                return Err(TrainingSetError::UniformLabels { group });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn n_groups(&self) -> usize {
        self.group_sizes.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Feature matrix, `[n_rows, n_features]`.
    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, f32> {
        self.features.row(row)
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn group_sizes(&self) -> &[u32] {
        &self.group_sizes
    }

    /// Query id of each group, in group order.
    pub fn query_ids(&self) -> &[String] {
        &self.query_ids
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn groups(&self) -> QueryGroups {
        QueryGroups::from_sizes(&self.group_sizes)
    }
}

/// Result of [`prepare`]: the training set plus filter diagnostics.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub training_set: TrainingSet,
    /// Queries dropped for carrying a single distinct label.
    pub skipped_groups: usize,
    /// Records read from the source, before filtering.
    pub n_records: usize,
}

// =============================================================================
// Preparation
// =============================================================================

struct PendingGroup {
    query_id: String,
    records: Vec<FeedbackRecord>,
}

impl PendingGroup {
    fn has_ranking_signal(&self) -> bool {
        let first = self.records[0].label;
        self.records.iter().any(|r| r.label != first)
    }
}

/// Group, filter and flatten feedback records.
///
/// The first record error aborts preparation. The aggregate number of skipped
/// single-label queries is logged once.
pub fn prepare<I>(records: I, schema: &FeatureSchema) -> Result<PreparedData, PrepareError>
where
    I: IntoIterator<Item = Result<FeedbackRecord, RecordError>>,
{
    let n_features = schema.n_features();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<PendingGroup> = Vec::new();
    let mut n_records = 0usize;

    for record in records {
        let record = record?;
        if record.features.len() != n_features {
            return Err(PrepareError::FeatureCount {
                query_id: record.query_id,
                version: schema.version().to_string(),
                expected: n_features,
                found: record.features.len(),
            });
        }
        n_records += 1;
        match index.get(&record.query_id) {
            Some(&g) => groups[g].records.push(record),
            None => {
                index.insert(record.query_id.clone(), groups.len());
                groups.push(PendingGroup {
                    query_id: record.query_id.clone(),
                    records: vec![record],
                });
            }
        }
    }

    let n_queries = groups.len();
    let (usable, skipped): (Vec<_>, Vec<_>) =
        groups.into_iter().partition(PendingGroup::has_ranking_signal);
    let skipped_groups = skipped.len();

    if skipped_groups > 0 {
        tracing::warn!(
            skipped_groups,
            n_queries,
            "Skipped {skipped_groups} queries with uniform labels (no ranking signal)"
        );
    }

    if usable.is_empty() {
        return Err(PrepareError::NoUsableData {
            n_records,
            skipped_groups,
        });
    }

    let n_rows: usize = usable.iter().map(|g| g.records.len()).sum();
    let mut flat = Vec::with_capacity(n_rows * n_features);
    let mut labels = Vec::with_capacity(n_rows);
    let mut group_sizes = Vec::with_capacity(usable.len());
    let mut query_ids = Vec::with_capacity(usable.len());

    for group in usable {
        group_sizes.push(group.records.len() as u32);
        query_ids.push(group.query_id);
        for record in group.records {
            flat.extend_from_slice(&record.features);
            labels.push(record.label);
        }
    }

    let features = Array2::from_shape_fn((n_rows, n_features), |(r, c)| flat[r * n_features + c]);

    tracing::info!(
        n_records,
        n_rows,
        n_groups = group_sizes.len(),
        "prepared ranking training set"
    );

    Ok(PreparedData {
        training_set: TrainingSet {
            features,
            labels,
            group_sizes,
            query_ids,
            schema: schema.clone(),
        },
        skipped_groups,
        n_records,
    })
}

/// [`prepare`] for records that are already parsed.
pub fn prepare_records<I>(records: I, schema: &FeatureSchema) -> Result<PreparedData, PrepareError>
where
    I: IntoIterator<Item = FeedbackRecord>,
{
    prepare(records.into_iter().map(Ok), schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn schema() -> FeatureSchema {
        FeatureSchema::new("test", ["x"]).unwrap()
    }

    fn rec(q: &str, label: u32, x: f32) -> FeedbackRecord {
        FeedbackRecord::new(q, label, vec![x])
    }

    #[test]
    fn drops_single_label_groups() {
        let records = vec![
            rec("q1", 0, 0.0),
            rec("q1", 1, 1.0),
            rec("q1", 2, 2.0),
            rec("q2", 1, 3.0),
            rec("q2", 1, 4.0),
        ];
        let prepared = prepare_records(records, &schema()).unwrap();
        let set = &prepared.training_set;
        assert_eq!(prepared.skipped_groups, 1);
        assert_eq!(prepared.n_records, 5);
        assert_eq!(set.n_rows(), 3);
        assert_eq!(set.group_sizes(), &[3]);
        assert_eq!(set.labels(), &[0, 1, 2]);
        assert_eq!(set.query_ids(), &["q1".to_string()]);
        assert!(set.validate().is_ok());
    }

    #[test]
    fn interleaved_rows_become_contiguous() {
        let records = vec![
            rec("b", 1, 0.0),
            rec("a", 0, 1.0),
            rec("b", 0, 2.0),
            rec("a", 2, 3.0),
            rec("b", 2, 4.0),
        ];
        let set = prepare_records(records, &schema()).unwrap().training_set;
        assert_eq!(set.group_sizes(), &[3, 2]);
        assert_eq!(set.labels(), &[1, 0, 2, 0, 2]);
        assert_eq!(set.features(), array![[0.0f32], [2.0], [4.0], [1.0], [3.0]]);
    }

    #[test]
    fn empty_input_is_no_usable_data() {
        let err = prepare_records(Vec::new(), &schema()).unwrap_err();
        assert!(matches!(
            err,
            PrepareError::NoUsableData {
                n_records: 0,
                skipped_groups: 0
            }
        ));
    }

    #[test]
    fn only_uniform_groups_is_no_usable_data() {
        let records = vec![rec("q", 1, 0.0), rec("q", 1, 1.0), rec("r", 0, 0.0)];
        let err = prepare_records(records, &schema()).unwrap_err();
        assert!(matches!(
            err,
            PrepareError::NoUsableData {
                n_records: 3,
                skipped_groups: 2
            }
        ));
    }

    #[test]
    fn wrong_feature_count_is_rejected() {
        let records = vec![FeedbackRecord::new("q", 0, vec![1.0, 2.0])];
        assert!(matches!(
            prepare_records(records, &schema()),
            Err(PrepareError::FeatureCount {
                expected: 1,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn validate_catches_broken_sets() {
        let empty = TrainingSet::new(Array2::zeros((0, 1)), vec![], vec![], schema());
        assert_eq!(empty.validate(), Err(TrainingSetError::NoGroups));

        let uniform = TrainingSet::new(Array2::zeros((2, 1)), vec![1, 1], vec![2], schema());
        assert_eq!(
            uniform.validate(),
            Err(TrainingSetError::UniformLabels { group: 0 })
        );

        let mismatch = TrainingSet::new(Array2::zeros((3, 1)), vec![0, 1, 0], vec![2], schema());
        assert!(matches!(
            mismatch.validate(),
            Err(TrainingSetError::RowCount { .. })
        ));
    }
}
