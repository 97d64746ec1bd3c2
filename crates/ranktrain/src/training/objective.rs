//! LambdaRank objective.
//!
//! Gradients come from pairs of documents in the same query with different
//! labels. Each pair pushes the more relevant document up and the other down,
//! weighted by how much NDCG would change if the two swapped places. Documents
//! in different groups are never paired.
//!
//! # Per-group procedure
//!
//! 1. Sort the group by current score, descending (stable).
//! 2. For each pair `(i, j)`, `i < j` in that order, `i < truncation_level`,
//!    with different labels, let `high` be the better-labelled document:
//!
//!    ```text
//!    delta_ndcg = (gain[high] - gain[low]) * |disc(i) - disc(j)| / max_dcg
//!    rho        = 1 / (1 + exp(sigma * (s_high - s_low)))
//!    grad[high] -= sigma * rho * delta_ndcg      grad[low] += same
//!    hess[both] += sigma^2 * rho * (1 - rho) * delta_ndcg
//!    ```
//!
//!    With normalization on, `delta_ndcg` is divided by `0.01 + |s_high - s_low|`
//!    unless every score in the group is equal.
//! 3. With normalization on, scale the group's gradients and hessians by
//!    `log2(1 + S) / S` where `S` is the summed absolute pair weight.

use super::gain::LabelGain;
use super::gradients::Gradients;
use super::metric::{discount, rank_by_score};
use crate::data::QueryGroups;
use crate::utils::Parallelism;

// =============================================================================
// ObjectiveFn
// =============================================================================

/// A training objective producing per-row gradients from current scores.
pub trait ObjectiveFn: Send + Sync {
    /// Fill `gradients` for the current `scores`.
    fn compute_gradients(
        &self,
        scores: &[f64],
        labels: &[u32],
        groups: &QueryGroups,
        gradients: &mut Gradients,
        parallelism: Parallelism,
    );

    /// Initial score of every row before the first tree.
    fn base_score(&self, _labels: &[u32], _groups: &QueryGroups) -> f64 {
        0.0
    }

    fn name(&self) -> &'static str;
}

// =============================================================================
// LambdaRankLoss
// =============================================================================

/// Pairwise LambdaRank loss targeting NDCG.
#[derive(Debug, Clone)]
pub struct LambdaRankLoss {
    gain: LabelGain,
    sigma: f64,
    truncation_level: usize,
    normalize: bool,
}

impl LambdaRankLoss {
    pub fn new(gain: LabelGain, sigma: f64, truncation_level: usize, normalize: bool) -> Self {
        Self {
            gain,
            sigma,
            truncation_level,
            normalize,
        }
    }

    /// `1 / maxDCG@truncation_level`, or 0 when no document has gain.
    fn inverse_max_dcg(&self, labels: &[u32]) -> f64 {
        let mut ideal = labels.to_vec();
        ideal.sort_unstable_by(|a, b| b.cmp(a));
        let max_dcg: f64 = ideal
            .iter()
            .take(self.truncation_level)
            .enumerate()
            .map(|(rank, &label)| self.gain.gain(label) * discount(rank))
            .sum();
        if max_dcg > 0.0 {
            1.0 / max_dcg
        } else {
            0.0
        }
    }

    /// Gradients of one group. `grads` and `hess` are overwritten.
    fn group_gradients(&self, scores: &[f64], labels: &[u32], grads: &mut [f32], hess: &mut [f32]) {
        let n = scores.len();
        let mut lambdas = vec![0.0f64; n];
        let mut hessians = vec![0.0f64; n];

        let inverse_max_dcg = self.inverse_max_dcg(labels);
        if n < 2 || inverse_max_dcg == 0.0 {
            grads.fill(0.0);
            hess.fill(0.0);
            return;
        }

        let order = rank_by_score(scores);
        let best_score = scores[order[0]];
        let worst_score = scores[order[n - 1]];
        let mut sum_lambdas = 0.0f64;

        for i in 0..(n - 1).min(self.truncation_level) {
            for j in (i + 1)..n {
                let (a, b) = (order[i], order[j]);
                if labels[a] == labels[b] {
                    continue;
                }
                let (high, high_rank, low, low_rank) = if labels[a] > labels[b] {
                    (a, i, b, j)
                } else {
                    (b, j, a, i)
                };

                let delta_score = scores[high] - scores[low];
                let dcg_gap = self.gain.gain(labels[high]) - self.gain.gain(labels[low]);
                let paired_discount = (discount(high_rank) - discount(low_rank)).abs();
                let mut delta_ndcg = dcg_gap * paired_discount * inverse_max_dcg;
                if self.normalize && best_score != worst_score {
                    delta_ndcg /= 0.01 + delta_score.abs();
                }

                let rho = 1.0 / (1.0 + (self.sigma * delta_score).exp());
                let pair_hess = rho * (1.0 - rho) * self.sigma * self.sigma * delta_ndcg;
                let pair_lambda = -self.sigma * rho * delta_ndcg;

                lambdas[high] += pair_lambda;
                hessians[high] += pair_hess;
                lambdas[low] -= pair_lambda;
                hessians[low] += pair_hess;
                sum_lambdas -= 2.0 * pair_lambda;
            }
        }

        let norm = if self.normalize && sum_lambdas > 0.0 {
            (1.0 + sum_lambdas).log2() / sum_lambdas
        } else {
            1.0
        };
        for (k, (g, h)) in grads.iter_mut().zip(hess.iter_mut()).enumerate() {
            *g = (lambdas[k] * norm) as f32;
            *h = (hessians[k] * norm) as f32;
        }
    }
}

impl ObjectiveFn for LambdaRankLoss {
    fn compute_gradients(
        &self,
        scores: &[f64],
        labels: &[u32],
        groups: &QueryGroups,
        gradients: &mut Gradients,
        parallelism: Parallelism,
    ) {
        debug_assert_eq!(scores.len(), groups.n_rows());
        debug_assert_eq!(labels.len(), groups.n_rows());

        let chunks = gradients.group_chunks_mut(groups);
        parallelism.maybe_par_for_each(chunks, |chunk| {
            let rows = chunk.rows;
            self.group_gradients(&scores[rows.clone()], &labels[rows], chunk.grads, chunk.hess);
        });
    }

    fn name(&self) -> &'static str {
        "lambdarank"
    }
}
