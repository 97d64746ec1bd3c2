//! Additive ensemble of regression trees.

use ndarray::{Array1, ArrayView2};

use super::tree::{Tree, TreeError};
use crate::utils::Parallelism;

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForestError {
    #[error("tree {tree_idx}: {error}")]
    InvalidTree { tree_idx: usize, error: TreeError },

    #[error("tree {tree_idx} splits on feature {feature}, model has {n_features} features")]
    FeatureOutOfRange {
        tree_idx: usize,
        feature: u32,
        n_features: usize,
    },
}

/// Sum of tree outputs plus a constant base score.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
    base_score: f64,
}

impl Forest {
    pub fn new(base_score: f64) -> Self {
        Self {
            trees: Vec::new(),
            base_score,
        }
    }

    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Score of one row. Trees are summed in training order.
    pub(crate) fn predict_row(&self, row: &[f32]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.predict_row(row))
    }

    /// Scores of a `[n_rows, n_features]` matrix.
    pub fn predict(&self, features: ArrayView2<'_, f32>, parallelism: Parallelism) -> Array1<f64> {
        let scores = parallelism.maybe_par_map(0..features.nrows(), |r| {
            let row = features.row(r);
            self.trees.iter().fold(self.base_score, |acc, tree| {
                acc + tree.leaf_value(tree.leaf_index(|f| row[f]))
            })
        });
        Array1::from(scores)
    }

    /// Number of splits per feature, for `n_features` features.
    pub fn split_counts(&self, n_features: usize) -> Vec<u32> {
        let mut counts = vec![0u32; n_features];
        for tree in &self.trees {
            for &f in tree.split_features() {
                if let Some(c) = counts.get_mut(f as usize) {
                    *c += 1;
                }
            }
        }
        counts
    }

    /// Check that every tree only references existing features.
    pub fn validate(&self, n_features: usize) -> Result<(), ForestError> {
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            if let Some(&feature) = tree
                .split_features()
                .iter()
                .find(|&&f| f as usize >= n_features)
            {
                return Err(ForestError::FeatureOutOfRange {
                    tree_idx,
                    feature,
                    n_features,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::NodeStats;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stump(feature: u32, threshold: f64, left: f64, right: f64) -> Tree {
        let mut tree = Tree::new(NodeStats::default());
        let l = NodeStats { value: left, ..Default::default() };
        let r = NodeStats { value: right, ..Default::default() };
        tree.split(0, feature, threshold, 1.0, l, r);
        tree
    }

    #[test]
    fn predictions_sum_trees_and_base() {
        let mut forest = Forest::new(0.5);
        forest.push_tree(stump(0, 0.0, -1.0, 1.0));
        forest.push_tree(stump(1, 10.0, 0.25, 0.75));

        let features = array![[-1.0f32, 5.0], [1.0, 20.0]];
        let scores = forest.predict(features.view(), Parallelism::Sequential);
        assert_abs_diff_eq!(scores[0], 0.5 - 1.0 + 0.25);
        assert_abs_diff_eq!(scores[1], 0.5 + 1.0 + 0.75);
        assert_eq!(forest.predict_row(&[1.0, 20.0]), scores[1]);
    }

    #[test]
    fn empty_forest_predicts_base_score() {
        let forest = Forest::new(0.0);
        let features = array![[1.0f32, 2.0]];
        assert_eq!(forest.predict(features.view(), Parallelism::Parallel)[0], 0.0);
    }

    #[test]
    fn split_counts_and_validation() {
        let mut forest = Forest::new(0.0);
        forest.push_tree(stump(1, 0.0, 0.0, 0.0));
        forest.push_tree(stump(1, 1.0, 0.0, 0.0));
        assert_eq!(forest.split_counts(3), vec![0, 2, 0]);
        assert!(forest.validate(2).is_ok());
        assert!(matches!(
            forest.validate(1),
            Err(ForestError::FeatureOutOfRange { feature: 1, .. })
        ));
    }
}
