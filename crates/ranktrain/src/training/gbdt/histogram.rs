//! Gradient histograms.
//!
//! A histogram holds, for every feature and bin, the gradient sum, hessian sum
//! and row count of the rows of one leaf. Sums are accumulated in `f64` so the
//! subtraction trick (`sibling = parent - child`) stays accurate.

use std::ops::{AddAssign, SubAssign};

use rayon::prelude::*;

use crate::data::BinnedDataset;
use crate::training::Gradients;
use crate::utils::Parallelism;

/// Accumulated statistics of one bin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramBin {
    pub grad: f64,
    pub hess: f64,
    pub count: u32,
}

impl AddAssign for HistogramBin {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.grad += rhs.grad;
        self.hess += rhs.hess;
        self.count += rhs.count;
    }
}

impl SubAssign for HistogramBin {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.grad -= rhs.grad;
        self.hess -= rhs.hess;
        self.count -= rhs.count;
    }
}

/// Per-feature bin statistics of one leaf.
#[derive(Debug, Clone)]
pub struct Histogram {
    features: Vec<Vec<HistogramBin>>,
}

impl Histogram {
    /// Zeroed histogram shaped after the dataset's bins.
    pub fn new(dataset: &BinnedDataset) -> Self {
        let features = (0..dataset.n_features())
            .map(|f| vec![HistogramBin::default(); dataset.n_bins(f)])
            .collect();
        Self { features }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn feature(&self, feature: usize) -> &[HistogramBin] {
        &self.features[feature]
    }

    /// Rebuild from scratch over `rows`, one feature per task.
    pub fn build(
        &mut self,
        dataset: &BinnedDataset,
        rows: &[u32],
        gradients: &Gradients,
        parallelism: Parallelism,
    ) {
        let grads = gradients.grads();
        let hess = gradients.hess();
        let fill = |(f, bins): (usize, &mut Vec<HistogramBin>)| {
            bins.fill(HistogramBin::default());
            let column = dataset.feature_bins(f);
            for &row in rows {
                let row = row as usize;
                let bin = &mut bins[column[row] as usize];
                bin.grad += grads[row] as f64;
                bin.hess += hess[row] as f64;
                bin.count += 1;
            }
        };
        if parallelism.is_parallel() {
            self.features.par_iter_mut().enumerate().for_each(fill);
        } else {
            self.features.iter_mut().enumerate().for_each(fill);
        }
    }

    /// Turn this parent histogram into its sibling: `self -= child`.
    pub fn subtract(&mut self, child: &Histogram) {
        for (parent, child) in self.features.iter_mut().zip(&child.features) {
            for (p, &c) in parent.iter_mut().zip(child) {
                *p -= c;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn setup() -> (BinnedDataset, Gradients) {
        let features = array![[0.0f32, 1.0], [1.0, 1.0], [0.0, 2.0], [1.0, 2.0]];
        let dataset = BinnedDataset::from_features(features.view(), 255, Parallelism::Sequential);
        let mut gradients = Gradients::new(4);
        let (g, h) = gradients.pairs_mut();
        g.copy_from_slice(&[1.0, -2.0, 3.0, -4.0]);
        h.copy_from_slice(&[0.5, 0.5, 1.0, 1.0]);
        (dataset, gradients)
    }

    #[test]
    fn build_accumulates_per_bin() {
        let (dataset, gradients) = setup();
        let mut hist = Histogram::new(&dataset);
        hist.build(&dataset, &[0, 1, 2, 3], &gradients, Parallelism::Parallel);
        let f0 = hist.feature(0);
        assert_abs_diff_eq!(f0[0].grad, 4.0);
        assert_abs_diff_eq!(f0[1].grad, -6.0);
        assert_eq!(f0[0].count, 2);
        let f1 = hist.feature(1);
        assert_abs_diff_eq!(f1[1].hess, 2.0);
    }

    #[test]
    fn subtraction_matches_direct_build() {
        let (dataset, gradients) = setup();
        let mut parent = Histogram::new(&dataset);
        parent.build(&dataset, &[0, 1, 2, 3], &gradients, Parallelism::Sequential);
        let mut left = Histogram::new(&dataset);
        left.build(&dataset, &[0, 2], &gradients, Parallelism::Sequential);
        let mut right = Histogram::new(&dataset);
        right.build(&dataset, &[1, 3], &gradients, Parallelism::Sequential);

        parent.subtract(&left);
        for f in 0..2 {
            assert_eq!(parent.feature(f), right.feature(f));
        }
    }
}
