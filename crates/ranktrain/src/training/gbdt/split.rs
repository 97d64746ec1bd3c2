//! Split gain and best-split search.

use super::histogram::Histogram;
use crate::data::BinnedDataset;
use crate::utils::Parallelism;

// =============================================================================
// GainParams
// =============================================================================

/// Regularization and constraints applied when scoring splits.
#[derive(Debug, Clone, PartialEq)]
pub struct GainParams {
    /// L2 penalty on leaf values.
    pub lambda_l2: f64,
    /// A split must improve the objective by more than this.
    pub min_gain_to_split: f64,
    /// Minimum rows per child.
    pub min_data_in_leaf: u32,
    /// Minimum hessian sum per child.
    pub min_sum_hessian_in_leaf: f64,
}

impl Default for GainParams {
    fn default() -> Self {
        Self {
            lambda_l2: 0.0,
            min_gain_to_split: 0.0,
            min_data_in_leaf: 20,
            min_sum_hessian_in_leaf: 1e-3,
        }
    }
}

impl GainParams {
    /// Objective reduction of a leaf: `G² / (H + λ)`.
    #[inline]
    pub fn leaf_score(&self, grad: f64, hess: f64) -> f64 {
        let denom = hess + self.lambda_l2;
        if denom > 0.0 {
            grad * grad / denom
        } else {
            0.0
        }
    }

    /// Optimal leaf output `-G / (H + λ)`, before shrinkage.
    #[inline]
    pub fn leaf_output(&self, grad: f64, hess: f64) -> f64 {
        let denom = hess + self.lambda_l2;
        if denom > 0.0 {
            -grad / denom
        } else {
            0.0
        }
    }

    /// Gain of splitting `parent` into `left` and `right`.
    #[inline]
    pub fn split_gain(&self, left: &LeafStats, right: &LeafStats, parent: &LeafStats) -> f64 {
        self.leaf_score(left.grad, left.hess) + self.leaf_score(right.grad, right.hess)
            - self.leaf_score(parent.grad, parent.hess)
    }

    /// Whether a child satisfies the row and hessian minimums.
    #[inline]
    pub fn is_valid_child(&self, stats: &LeafStats) -> bool {
        stats.count >= self.min_data_in_leaf && stats.hess >= self.min_sum_hessian_in_leaf
    }

    /// Whether a leaf could produce two valid children at all.
    #[inline]
    pub fn can_split(&self, stats: &LeafStats) -> bool {
        stats.count >= 2 * self.min_data_in_leaf.max(1)
            && stats.hess >= 2.0 * self.min_sum_hessian_in_leaf
    }
}

// =============================================================================
// Split types
// =============================================================================

/// Gradient statistics of a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LeafStats {
    pub grad: f64,
    pub hess: f64,
    pub count: u32,
}

impl LeafStats {
    #[inline]
    fn minus(&self, other: &LeafStats) -> LeafStats {
        LeafStats {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

/// A numerical split: rows with `bin <= bin` (equivalently
/// `value <= threshold`) go left.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitInfo {
    pub feature: usize,
    pub bin: u8,
    pub threshold: f64,
    pub gain: f64,
    pub left: LeafStats,
    pub right: LeafStats,
}

// =============================================================================
// Search
// =============================================================================

/// Best split of one feature, scanning bins left to right.
fn best_feature_split(
    histogram: &Histogram,
    feature: usize,
    parent: &LeafStats,
    dataset: &BinnedDataset,
    params: &GainParams,
) -> Option<SplitInfo> {
    let mapper = dataset.bin_mapper(feature);
    if mapper.is_trivial() {
        return None;
    }
    let bins = histogram.feature(feature);
    let mut left = LeafStats::default();
    let mut best: Option<SplitInfo> = None;

    for (bin, stats) in bins.iter().enumerate().take(bins.len() - 1) {
        left.grad += stats.grad;
        left.hess += stats.hess;
        left.count += stats.count;
        if stats.count == 0 {
            continue;
        }
        let right = parent.minus(&left);
        if right.count < params.min_data_in_leaf.max(1) {
            break;
        }
        if !params.is_valid_child(&left) || !params.is_valid_child(&right) {
            continue;
        }
        let gain = params.split_gain(&left, &right, parent);
        if gain > params.min_gain_to_split && best.as_ref().map_or(true, |b| gain > b.gain) {
            best = Some(SplitInfo {
                feature,
                bin: bin as u8,
                threshold: mapper.threshold(bin),
                gain,
                left,
                right,
            });
        }
    }
    best
}

/// Best split over all features, or `None` if no split is valid.
///
/// Ties go to the lower feature index, then the lower bin.
pub fn find_best_split(
    histogram: &Histogram,
    parent: &LeafStats,
    dataset: &BinnedDataset,
    params: &GainParams,
    parallelism: Parallelism,
) -> Option<SplitInfo> {
    let candidates = parallelism.maybe_par_map(0..histogram.n_features(), |f| {
        best_feature_split(histogram, f, parent, dataset, params)
    });
    candidates
        .into_iter()
        .flatten()
        .fold(None, |best: Option<SplitInfo>, cand| match best {
            Some(b) if b.gain >= cand.gain => Some(b),
            _ => Some(cand),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::Gradients;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn params(min_data: u32) -> GainParams {
        GainParams {
            min_data_in_leaf: min_data,
            min_sum_hessian_in_leaf: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn gain_formula() {
        let p = GainParams {
            lambda_l2: 1.0,
            ..Default::default()
        };
        let left = LeafStats { grad: -4.0, hess: 3.0, count: 3 };
        let right = LeafStats { grad: 2.0, hess: 1.0, count: 1 };
        let parent = LeafStats { grad: -2.0, hess: 4.0, count: 4 };
        // 16/4 + 4/2 - 4/5
        assert_abs_diff_eq!(p.split_gain(&left, &right, &parent), 5.2, epsilon = 1e-12);
        assert_abs_diff_eq!(p.leaf_output(-4.0, 3.0), 1.0);
    }

    #[test]
    fn zero_hessian_is_safe() {
        let p = GainParams::default();
        assert_eq!(p.leaf_score(1.0, 0.0), 0.0);
        assert_eq!(p.leaf_output(1.0, 0.0), 0.0);
    }

    #[test]
    fn finds_separating_feature() {
        // Feature 1 separates negative from positive gradients, feature 0 is noise.
        let features = array![[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let dataset = BinnedDataset::from_features(features.view(), 255, Parallelism::Sequential);
        let mut gradients = Gradients::new(4);
        let (g, h) = gradients.pairs_mut();
        g.copy_from_slice(&[-1.0, -1.0, 1.0, 1.0]);
        h.fill(1.0);

        let rows = [0, 1, 2, 3];
        let mut hist = Histogram::new(&dataset);
        hist.build(&dataset, &rows, &gradients, Parallelism::Sequential);
        let parent = LeafStats { grad: 0.0, hess: 4.0, count: 4 };

        let split = find_best_split(&hist, &parent, &dataset, &params(1), Parallelism::Parallel)
            .expect("a split exists");
        assert_eq!(split.feature, 1);
        assert_eq!(split.bin, 0);
        assert_abs_diff_eq!(split.threshold, 0.5);
        assert_abs_diff_eq!(split.gain, 4.0);
        assert_eq!(split.left.count, 2);
    }

    #[test]
    fn min_data_blocks_small_children() {
        let features = array![[0.0f32], [1.0], [1.0], [1.0]];
        let dataset = BinnedDataset::from_features(features.view(), 255, Parallelism::Sequential);
        let mut gradients = Gradients::new(4);
        let (g, h) = gradients.pairs_mut();
        g.copy_from_slice(&[-3.0, 1.0, 1.0, 1.0]);
        h.fill(1.0);
        let mut hist = Histogram::new(&dataset);
        hist.build(&dataset, &[0, 1, 2, 3], &gradients, Parallelism::Sequential);
        let parent = LeafStats { grad: 0.0, hess: 4.0, count: 4 };

        let seq = Parallelism::Sequential;
        assert!(find_best_split(&hist, &parent, &dataset, &params(1), seq).is_some());
        assert!(find_best_split(&hist, &parent, &dataset, &params(2), seq).is_none());
    }
}
