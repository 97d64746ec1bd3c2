//! Leaf-wise tree grower.
//!
//! Grows one tree per boosting round from the current gradients:
//!
//! 1. Build the root histogram and find its best split.
//! 2. Repeatedly split the leaf with the largest gain (ties go to the lower
//!    leaf id) until `max_leaves` is reached or no leaf has a valid split.
//! 3. After each split, build the histogram of the smaller child directly and
//!    derive the larger child's by subtracting it from the parent's.
//! 4. Set leaf outputs to `-G / (H + λ)` and shrink by the learning rate.
//!
//! The partitioner's final leaf ranges are kept so the trainer can update
//! training scores without traversing the tree per row.

use crate::data::BinnedDataset;
use crate::repr::{NodeStats, Tree};
use crate::training::Gradients;
use crate::utils::Parallelism;

use super::histogram::Histogram;
use super::partition::RowPartitioner;
use super::split::{find_best_split, GainParams, LeafStats, SplitInfo};

/// Parameters for tree growth.
#[derive(Debug, Clone)]
pub struct GrowerParams {
    pub gain: GainParams,
    pub max_leaves: usize,
    /// Depth limit; `None` means unlimited.
    pub max_depth: Option<u32>,
    pub learning_rate: f64,
}

impl Default for GrowerParams {
    fn default() -> Self {
        Self {
            gain: GainParams::default(),
            max_leaves: 31,
            max_depth: None,
            learning_rate: 0.1,
        }
    }
}

/// Grows trees and remembers the last tree's leaf assignment.
pub struct TreeGrower {
    params: GrowerParams,
    partitioner: RowPartitioner,
    histograms: Vec<Option<Histogram>>,
    candidates: Vec<Option<SplitInfo>>,
    leaf_stats: Vec<LeafStats>,
    leaf_depth: Vec<u32>,
    last_leaf_values: Vec<f64>,
}

impl TreeGrower {
    pub fn new(dataset: &BinnedDataset, params: GrowerParams) -> Self {
        let max_leaves = params.max_leaves.max(1);
        Self {
            partitioner: RowPartitioner::new(dataset.n_rows(), max_leaves),
            histograms: vec![None; max_leaves],
            candidates: vec![None; max_leaves],
            leaf_stats: vec![LeafStats::default(); max_leaves],
            leaf_depth: vec![0; max_leaves],
            last_leaf_values: Vec::new(),
            params,
        }
    }

    /// Grow one tree. Leaf values of the returned tree include shrinkage.
    pub fn grow(
        &mut self,
        dataset: &BinnedDataset,
        gradients: &Gradients,
        parallelism: Parallelism,
    ) -> Tree {
        self.partitioner.reset();
        self.histograms.iter_mut().for_each(|h| *h = None);
        self.candidates.iter_mut().for_each(|c| *c = None);

        let (grad, hess) = gradients.sum(self.partitioner.leaf_rows(0));
        let root = LeafStats {
            grad,
            hess,
            count: dataset.n_rows() as u32,
        };
        let mut tree = Tree::new(self.node_stats(&root));
        self.leaf_stats[0] = root;
        self.leaf_depth[0] = 0;

        let mut root_hist = Histogram::new(dataset);
        root_hist.build(dataset, self.partitioner.leaf_rows(0), gradients, parallelism);
        self.candidates[0] = self.evaluate_leaf(0, &root_hist, dataset, parallelism);
        self.histograms[0] = Some(root_hist);

        while tree.n_leaves() < self.params.max_leaves {
            let Some(leaf) = self.best_candidate() else {
                break;
            };
            let Some(split) = self.candidates[leaf].take() else {
                break;
            };

            let right_leaf = tree.split(
                leaf,
                split.feature as u32,
                split.threshold,
                split.gain,
                self.node_stats(&split.left),
                self.node_stats(&split.right),
            );
            let (right, left_count, right_count) =
                self.partitioner
                    .split(leaf, dataset.feature_bins(split.feature), split.bin);
            debug_assert_eq!(right, right_leaf);
            debug_assert_eq!(left_count, split.left.count as usize);
            debug_assert_eq!(right_count, split.right.count as usize);

            let depth = self.leaf_depth[leaf] + 1;
            self.leaf_depth[leaf] = depth;
            self.leaf_depth[right] = depth;
            self.leaf_stats[leaf] = split.left;
            self.leaf_stats[right] = split.right;

            // Build the smaller child, derive the larger from the parent.
            let (small, large) = if left_count <= right_count {
                (leaf, right)
            } else {
                (right, leaf)
            };
            let mut small_hist = Histogram::new(dataset);
            small_hist.build(dataset, self.partitioner.leaf_rows(small), gradients, parallelism);
            let large_hist = match self.histograms[leaf].take() {
                Some(mut parent) => {
                    parent.subtract(&small_hist);
                    parent
                }
                None => {
                    let mut h = Histogram::new(dataset);
                    h.build(dataset, self.partitioner.leaf_rows(large), gradients, parallelism);
                    h
                }
            };

            self.candidates[small] = self.evaluate_leaf(small, &small_hist, dataset, parallelism);
            self.candidates[large] = self.evaluate_leaf(large, &large_hist, dataset, parallelism);
            self.histograms[small] = Some(small_hist);
            self.histograms[large] = Some(large_hist);
        }

        tree.shrink(self.params.learning_rate);
        self.last_leaf_values = tree.leaf_values().to_vec();
        tree
    }

    /// Add the last grown tree's outputs to `scores` using the final leaf ranges.
    pub fn update_predictions(&self, scores: &mut [f64]) {
        for (leaf, &value) in self.last_leaf_values.iter().enumerate() {
            for &row in self.partitioner.leaf_rows(leaf) {
                scores[row as usize] += value;
            }
        }
    }

    fn node_stats(&self, stats: &LeafStats) -> NodeStats {
        NodeStats {
            value: self.params.gain.leaf_output(stats.grad, stats.hess),
            weight: stats.hess,
            count: stats.count,
        }
    }

    fn evaluate_leaf(
        &self,
        leaf: usize,
        hist: &Histogram,
        dataset: &BinnedDataset,
        parallelism: Parallelism,
    ) -> Option<SplitInfo> {
        let stats = &self.leaf_stats[leaf];
        if let Some(max_depth) = self.params.max_depth {
            if self.leaf_depth[leaf] >= max_depth {
                return None;
            }
        }
        if !self.params.gain.can_split(stats) {
            return None;
        }
        find_best_split(hist, stats, dataset, &self.params.gain, parallelism)
    }

    fn best_candidate(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (leaf, cand) in self.candidates.iter().enumerate() {
            if let Some(split) = cand {
                if best.map_or(true, |(_, gain)| split.gain > gain) {
                    best = Some((leaf, split.gain));
                }
            }
        }
        best.map(|(leaf, _)| leaf)
    }
}
