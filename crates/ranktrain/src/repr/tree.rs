//! Regression tree in the array layout used by LightGBM model files.
//!
//! A tree with `n` leaves has `n - 1` internal nodes. Child references are
//! `i32`: a value `>= 0` names an internal node, a negative value `c` names
//! leaf `!c`. Internal node 0 is the root. Leaf values already include the
//! learning-rate shrinkage.

use serde::{Deserialize, Serialize};

// =============================================================================
// TreeError
// =============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("tree has no leaves")]
    Empty,

    #[error("`{field}` has {found} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("node {node} references child {child}, which does not exist")]
    ChildOutOfBounds { node: usize, child: i32 },

    #[error("node {node} references child {child}, children must come after their parent")]
    ChildOrder { node: usize, child: i32 },

    #[error("{kind} {index} is referenced {count} times, expected once")]
    Reference {
        kind: &'static str,
        index: usize,
        count: usize,
    },

    #[error("node {node} has a NaN threshold")]
    NanThreshold { node: usize },
}

// =============================================================================
// TreeArrays
// =============================================================================

/// Raw tree arrays, as persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeArrays {
    pub split_feature: Vec<u32>,
    pub split_gain: Vec<f64>,
    pub threshold: Vec<f64>,
    pub left_child: Vec<i32>,
    pub right_child: Vec<i32>,
    pub internal_value: Vec<f64>,
    pub internal_weight: Vec<f64>,
    pub internal_count: Vec<u32>,
    pub leaf_value: Vec<f64>,
    pub leaf_weight: Vec<f64>,
    pub leaf_count: Vec<u32>,
    pub shrinkage: f64,
}

/// Output, hessian sum and row count of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeStats {
    pub value: f64,
    pub weight: f64,
    pub count: u32,
}

// =============================================================================
// Tree
// =============================================================================

/// A validated binary regression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    arrays: TreeArrays,
    /// Internal node owning each leaf, `-1` for the root leaf.
    leaf_parent: Vec<i32>,
}

impl Tree {
    /// Single-leaf tree.
    pub fn new(root: NodeStats) -> Self {
        Self {
            arrays: TreeArrays {
                leaf_value: vec![root.value],
                leaf_weight: vec![root.weight],
                leaf_count: vec![root.count],
                shrinkage: 1.0,
                ..Default::default()
            },
            leaf_parent: vec![-1],
        }
    }

    /// Validate persisted arrays. Optional statistics arrays may be empty and
    /// are zero-filled.
    pub fn from_arrays(mut arrays: TreeArrays) -> Result<Self, TreeError> {
        let n_leaves = arrays.leaf_value.len();
        if n_leaves == 0 {
            return Err(TreeError::Empty);
        }
        let n_internal = n_leaves - 1;

        let required = [
            ("split_feature", arrays.split_feature.len()),
            ("threshold", arrays.threshold.len()),
            ("left_child", arrays.left_child.len()),
            ("right_child", arrays.right_child.len()),
        ];
        for (field, found) in required {
            if found != n_internal {
                return Err(TreeError::LengthMismatch {
                    field,
                    expected: n_internal,
                    found,
                });
            }
        }
        fill_optional(&mut arrays.split_gain, "split_gain", n_internal)?;
        fill_optional(&mut arrays.internal_value, "internal_value", n_internal)?;
        fill_optional(&mut arrays.internal_weight, "internal_weight", n_internal)?;
        fill_optional(&mut arrays.internal_count, "internal_count", n_internal)?;
        fill_optional(&mut arrays.leaf_weight, "leaf_weight", n_leaves)?;
        fill_optional(&mut arrays.leaf_count, "leaf_count", n_leaves)?;

        let mut node_refs = vec![0usize; n_internal];
        let mut leaf_refs = vec![0usize; n_leaves];
        let mut leaf_parent = vec![-1i32; n_leaves];

        for node in 0..n_internal {
            if arrays.threshold[node].is_nan() {
                return Err(TreeError::NanThreshold { node });
            }
            for child in [arrays.left_child[node], arrays.right_child[node]] {
                if child >= 0 {
                    let c = child as usize;
                    if c >= n_internal {
                        return Err(TreeError::ChildOutOfBounds { node, child });
                    }
                    if c <= node {
                        return Err(TreeError::ChildOrder { node, child });
                    }
                    node_refs[c] += 1;
                } else {
                    let leaf = !child as usize;
                    if leaf >= n_leaves {
                        return Err(TreeError::ChildOutOfBounds { node, child });
                    }
                    leaf_refs[leaf] += 1;
                    leaf_parent[leaf] = node as i32;
                }
            }
        }

        for (index, &count) in node_refs.iter().enumerate().skip(1) {
            if count != 1 {
                return Err(TreeError::Reference {
                    kind: "node",
                    index,
                    count,
                });
            }
        }
        if n_internal > 0 {
            for (index, &count) in leaf_refs.iter().enumerate() {
                if count != 1 {
                    return Err(TreeError::Reference {
                        kind: "leaf",
                        index,
                        count,
                    });
                }
            }
        }

        Ok(Self {
            arrays,
            leaf_parent,
        })
    }

    pub fn arrays(&self) -> &TreeArrays {
        &self.arrays
    }

    #[inline]
    pub fn n_leaves(&self) -> usize {
        self.arrays.leaf_value.len()
    }

    #[inline]
    pub fn leaf_value(&self, leaf: usize) -> f64 {
        self.arrays.leaf_value[leaf]
    }

    pub fn leaf_values(&self) -> &[f64] {
        &self.arrays.leaf_value
    }

    pub fn split_features(&self) -> &[u32] {
        &self.arrays.split_feature
    }

    pub fn shrinkage(&self) -> f64 {
        self.arrays.shrinkage
    }

    /// Split `leaf`. The left child keeps the leaf id, the right child gets
    /// id `n_leaves()` (before the call), which is returned.
    pub fn split(
        &mut self,
        leaf: usize,
        feature: u32,
        threshold: f64,
        gain: f64,
        left: NodeStats,
        right: NodeStats,
    ) -> usize {
        let a = &mut self.arrays;
        let node = a.split_feature.len() as i32;
        let new_leaf = a.leaf_value.len();

        let parent = self.leaf_parent[leaf];
        if parent >= 0 {
            let p = parent as usize;
            if a.left_child[p] == !(leaf as i32) {
                a.left_child[p] = node;
            } else {
                a.right_child[p] = node;
            }
        }

        a.split_feature.push(feature);
        a.threshold.push(threshold);
        a.split_gain.push(gain);
        a.left_child.push(!(leaf as i32));
        a.right_child.push(!(new_leaf as i32));
        a.internal_value.push(a.leaf_value[leaf]);
        a.internal_weight.push(a.leaf_weight[leaf]);
        a.internal_count.push(a.leaf_count[leaf]);

        a.leaf_value[leaf] = left.value;
        a.leaf_weight[leaf] = left.weight;
        a.leaf_count[leaf] = left.count;
        a.leaf_value.push(right.value);
        a.leaf_weight.push(right.weight);
        a.leaf_count.push(right.count);

        self.leaf_parent[leaf] = node;
        self.leaf_parent.push(node);
        new_leaf
    }

    /// Multiply every output by `rate`.
    pub fn shrink(&mut self, rate: f64) {
        let a = &mut self.arrays;
        a.leaf_value.iter_mut().for_each(|v| *v *= rate);
        a.internal_value.iter_mut().for_each(|v| *v *= rate);
        a.shrinkage *= rate;
    }

    /// Leaf reached by a row. `value(f)` returns feature `f`; NaN is treated as 0.
    #[inline]
    pub fn leaf_index<F: Fn(usize) -> f32>(&self, value: F) -> usize {
        if self.n_leaves() == 1 {
            return 0;
        }
        let a = &self.arrays;
        let mut node = 0usize;
        loop {
            let v = value(a.split_feature[node] as usize);
            let v = if v.is_nan() { 0.0 } else { v as f64 };
            let next = if v <= a.threshold[node] {
                a.left_child[node]
            } else {
                a.right_child[node]
            };
            if next < 0 {
                return !next as usize;
            }
            node = next as usize;
        }
    }

    /// Prediction for a row given as a slice in feature order.
    #[inline]
    pub(crate) fn predict_row(&self, row: &[f32]) -> f64 {
        self.leaf_value(self.leaf_index(|f| row[f]))
    }
}

fn fill_optional<T: Clone + Default>(
    values: &mut Vec<T>,
    field: &'static str,
    expected: usize,
) -> Result<(), TreeError> {
    if values.is_empty() {
        values.resize(expected, T::default());
    }
    if values.len() != expected {
        return Err(TreeError::LengthMismatch {
            field,
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(value: f64, count: u32) -> NodeStats {
        NodeStats {
            value,
            weight: count as f64,
            count,
        }
    }

    /// Root on f0 <= 0.5; its right child split on f1 <= 1.5.
    fn two_split_tree() -> Tree {
        let mut tree = Tree::new(stats(0.0, 10));
        let right = tree.split(0, 0, 0.5, 1.0, stats(-1.0, 4), stats(1.0, 6));
        assert_eq!(right, 1);
        let right2 = tree.split(1, 1, 1.5, 0.5, stats(2.0, 3), stats(3.0, 3));
        assert_eq!(right2, 2);
        tree
    }

    #[test]
    fn split_layout_matches_lightgbm() {
        let tree = two_split_tree();
        let a = tree.arrays();
        assert_eq!(a.left_child, vec![!0, !1]);
        assert_eq!(a.right_child, vec![1, !2]);
        assert_eq!(a.leaf_value, vec![-1.0, 2.0, 3.0]);
        assert_eq!(a.internal_value, vec![0.0, 1.0]);
        assert_eq!(a.internal_count, vec![10, 6]);
    }

    #[test]
    fn routing() {
        let tree = two_split_tree();
        assert_eq!(tree.predict_row(&[0.5, 9.0]), -1.0);
        assert_eq!(tree.predict_row(&[0.6, 1.5]), 2.0);
        assert_eq!(tree.predict_row(&[0.6, 1.6]), 3.0);
        assert_eq!(tree.predict_row(&[f32::NAN, 9.0]), -1.0);
    }

    #[test]
    fn shrink_scales_outputs() {
        let mut tree = two_split_tree();
        tree.shrink(0.1);
        assert!((tree.leaf_value(2) - 0.3).abs() < 1e-12);
        assert!((tree.shrinkage() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn from_arrays_round_trips_and_validates() {
        let tree = two_split_tree();
        let rebuilt = Tree::from_arrays(tree.arrays().clone()).unwrap();
        assert_eq!(rebuilt, tree);

        let mut broken = tree.arrays().clone();
        broken.right_child[0] = !0;
        assert!(matches!(
            Tree::from_arrays(broken),
            Err(TreeError::Reference { .. })
        ));

        let mut short = tree.arrays().clone();
        short.threshold.pop();
        assert!(matches!(
            Tree::from_arrays(short),
            Err(TreeError::LengthMismatch { field: "threshold", .. })
        ));
    }

    #[test]
    fn single_leaf_from_arrays() {
        let arrays = TreeArrays {
            leaf_value: vec![0.25],
            shrinkage: 1.0,
            ..Default::default()
        };
        let tree = Tree::from_arrays(arrays).unwrap();
        assert_eq!(tree.predict_row(&[1.0]), 0.25);
    }
}
