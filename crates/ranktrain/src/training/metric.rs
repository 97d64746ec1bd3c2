//! Ranking evaluation metrics.
//!
//! Metrics are computed per query group and averaged over groups. Per-group
//! values are summed in group order, so the result does not depend on how the
//! work is split across threads.

use serde::{Deserialize, Serialize};

use super::gain::LabelGain;
use crate::data::QueryGroups;
use crate::utils::Parallelism;

// =============================================================================
// MetricValue
// =============================================================================

/// One named metric reading, e.g. `ndcg@5 = 0.81`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={:.6}", self.name, self.value)
    }
}

// =============================================================================
// MetricFn
// =============================================================================

/// A metric evaluated over grouped scores.
pub trait MetricFn: Send + Sync {
    /// Evaluate `scores` against `labels`. One value per configured cutoff.
    fn evaluate(
        &self,
        scores: &[f64],
        labels: &[u32],
        groups: &QueryGroups,
        parallelism: Parallelism,
    ) -> Vec<MetricValue>;

    fn name(&self) -> &'static str;
}

// =============================================================================
// NDCG
// =============================================================================

/// Position discount `1 / log2(2 + rank)` for a 0-based rank.
#[inline]
pub fn discount(rank: usize) -> f64 {
    1.0 / (rank as f64 + 2.0).log2()
}

/// Order of rows by descending score. Equal scores keep their input order.
pub fn rank_by_score(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Normalized discounted cumulative gain at one or more cutoffs.
///
/// A group whose ideal DCG at a cutoff is zero scores 1 at that cutoff.
#[derive(Debug, Clone)]
pub struct Ndcg {
    eval_at: Vec<usize>,
    gain: LabelGain,
}

impl Ndcg {
    pub fn new(eval_at: Vec<usize>, gain: LabelGain) -> Self {
        Self { eval_at, gain }
    }

    fn dcg_at(&self, labels: impl Iterator<Item = u32>, k: usize) -> f64 {
        labels
            .take(k)
            .enumerate()
            .map(|(rank, label)| self.gain.gain(label) * discount(rank))
            .sum()
    }

    /// NDCG of one group at every cutoff.
    pub fn group_ndcg(&self, scores: &[f64], labels: &[u32]) -> Vec<f64> {
        let order = rank_by_score(scores);
        let mut ideal = labels.to_vec();
        ideal.sort_unstable_by(|a, b| b.cmp(a));

        self.eval_at
            .iter()
            .map(|&k| {
                let max_dcg = self.dcg_at(ideal.iter().copied(), k);
                if max_dcg <= 0.0 {
                    1.0
                } else {
                    self.dcg_at(order.iter().map(|&i| labels[i]), k) / max_dcg
                }
            })
            .collect()
    }
}

impl MetricFn for Ndcg {
    fn evaluate(
        &self,
        scores: &[f64],
        labels: &[u32],
        groups: &QueryGroups,
        parallelism: Parallelism,
    ) -> Vec<MetricValue> {
        let ranges: Vec<_> = groups.iter().collect();
        let per_group: Vec<Vec<f64>> = parallelism.maybe_par_map(ranges, |rows| {
            self.group_ndcg(&scores[rows.clone()], &labels[rows])
        });

        let n_groups = per_group.len().max(1) as f64;
        self.eval_at
            .iter()
            .enumerate()
            .map(|(i, &k)| {
                let total: f64 = per_group.iter().map(|g| g[i]).sum();
                MetricValue {
                    name: format!("ndcg@{k}"),
                    value: total / n_groups,
                }
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "ndcg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ndcg(eval_at: Vec<usize>) -> Ndcg {
        Ndcg::new(eval_at, LabelGain::default())
    }

    #[test]
    fn perfect_order_scores_one() {
        let scores = [3.0, 2.0, 1.0];
        let labels = [2, 1, 0];
        let values = ndcg(vec![1, 3]).group_ndcg(&scores, &labels);
        assert_abs_diff_eq!(values[0], 1.0);
        assert_abs_diff_eq!(values[1], 1.0);
    }

    #[test]
    fn reversed_order() {
        let scores = [1.0, 2.0, 3.0];
        let labels = [2, 1, 0];
        let values = ndcg(vec![3]).group_ndcg(&scores, &labels);
        // DCG = 0*1 + 1/log2(3) + 3/log2(4); IDCG = 3 + 1/log2(3)
        let dcg = 1.0 / 3f64.log2() + 3.0 / 2.0;
        let idcg = 3.0 + 1.0 / 3f64.log2();
        assert_abs_diff_eq!(values[0], dcg / idcg, epsilon = 1e-12);
    }

    #[test]
    fn all_zero_labels_score_one() {
        let values = ndcg(vec![3]).group_ndcg(&[0.3, 0.1], &[0, 0]);
        assert_eq!(values, vec![1.0]);
    }

    #[test]
    fn ties_keep_input_order() {
        assert_eq!(rank_by_score(&[1.0, 2.0, 1.0, 2.0]), vec![1, 3, 0, 2]);
        // Tied scores: the irrelevant first row ranks above the relevant one.
        let values = ndcg(vec![1]).group_ndcg(&[0.0, 0.0], &[0, 2]);
        assert_eq!(values, vec![0.0]);
    }

    #[test]
    fn mean_over_groups_is_order_independent() {
        let metric = ndcg(vec![3, 5]);
        let scores = [0.1, 0.5, 0.2, 0.9, 0.3, 0.4];
        let labels = [0, 2, 1, 0, 1, 2];
        let groups = QueryGroups::from_sizes(&[3, 3]);
        let forward = metric.evaluate(&scores, &labels, &groups, Parallelism::Sequential);

        let swapped_scores = [0.9, 0.3, 0.4, 0.1, 0.5, 0.2];
        let swapped_labels = [0, 1, 2, 0, 2, 1];
        let backward =
            metric.evaluate(&swapped_scores, &swapped_labels, &groups, Parallelism::Parallel);

        assert_eq!(forward[0].name, "ndcg@3");
        assert_eq!(forward[1].name, "ndcg@5");
        for (a, b) in forward.iter().zip(&backward) {
            assert_abs_diff_eq!(a.value, b.value, epsilon = 1e-12);
        }
    }
}
