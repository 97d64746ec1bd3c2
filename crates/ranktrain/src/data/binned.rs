//! Feature quantization for histogram training.
//!
//! Each feature is mapped to at most 256 bins. A bin is identified by its
//! inclusive upper bound: value `v` falls in the first bin whose bound is
//! `>= v`, so a split on bin `b` sends `v <= bounds[b]` left. The bound of the
//! split bin becomes the tree threshold, which keeps training-time routing and
//! inference-time routing identical.

use ndarray::{ArrayView1, ArrayView2};

use crate::utils::Parallelism;

/// Maximum bins per feature (bins are stored as `u8`).
pub const MAX_BINS: usize = 256;

// =============================================================================
// BinMapper
// =============================================================================

/// Bin boundaries of one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMapper {
    /// Inclusive upper bound per bin; the last one is `+inf`.
    upper_bounds: Vec<f64>,
    min_value: f64,
    max_value: f64,
}

impl BinMapper {
    /// Compute bins from the observed values of a feature.
    ///
    /// With at most `max_bins` distinct values every value gets its own bin
    /// and bounds sit halfway between neighbours. Otherwise bins are cut at
    /// equal-frequency points, still on midpoints between distinct values.
    pub fn from_values(values: ArrayView1<'_, f32>, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(1, MAX_BINS);
        let mut sorted: Vec<f32> = values.iter().copied().collect();
        sorted.sort_by(f32::total_cmp);

        let mut distinct: Vec<(f32, usize)> = Vec::new();
        for v in sorted {
            match distinct.last_mut() {
                Some((last, count)) if *last == v => *count += 1,
                _ => distinct.push((v, 1)),
            }
        }

        let (min_value, max_value) = match (distinct.first(), distinct.last()) {
            (Some(&(lo, _)), Some(&(hi, _))) => (lo as f64, hi as f64),
            _ => (0.0, 0.0),
        };

        let midpoint = |i: usize| (distinct[i].0 as f64 + distinct[i + 1].0 as f64) / 2.0;
        let mut upper_bounds = Vec::with_capacity(max_bins.min(distinct.len()).max(1));

        if distinct.len() <= max_bins {
            upper_bounds.extend((0..distinct.len().saturating_sub(1)).map(midpoint));
        } else {
            let total: usize = distinct.iter().map(|&(_, c)| c).sum();
            let per_bin = total as f64 / max_bins as f64;
            let mut in_bin = 0usize;
            for i in 0..distinct.len() - 1 {
                in_bin += distinct[i].1;
                if in_bin as f64 >= per_bin && upper_bounds.len() < max_bins - 1 {
                    upper_bounds.push(midpoint(i));
                    in_bin = 0;
                }
            }
        }
        upper_bounds.push(f64::INFINITY);

        Self {
            upper_bounds,
            min_value,
            max_value,
        }
    }

    #[inline]
    pub fn n_bins(&self) -> usize {
        self.upper_bounds.len()
    }

    /// Bin of a raw value.
    #[inline]
    pub fn bin_of(&self, value: f32) -> u8 {
        let v = value as f64;
        self.upper_bounds.partition_point(|&ub| ub < v) as u8
    }

    /// Split threshold for "bin <= `bin`".
    #[inline]
    pub fn threshold(&self, bin: usize) -> f64 {
        self.upper_bounds[bin]
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    /// Constant features have one bin and can never be split.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        self.n_bins() <= 1
    }
}

// =============================================================================
// BinnedDataset
// =============================================================================

/// Column-major binned feature matrix.
#[derive(Debug, Clone)]
pub struct BinnedDataset {
    n_rows: usize,
    mappers: Vec<BinMapper>,
    columns: Vec<Box<[u8]>>,
}

impl BinnedDataset {
    /// Quantize a `[n_rows, n_features]` matrix, one feature per task.
    pub fn from_features(
        features: ArrayView2<'_, f32>,
        max_bins: usize,
        parallelism: Parallelism,
    ) -> Self {
        let n_rows = features.nrows();
        let binned = parallelism.maybe_par_map(0..features.ncols(), |f| {
            let column = features.column(f);
            let mapper = BinMapper::from_values(column, max_bins);
            let bins: Box<[u8]> = column.iter().map(|&v| mapper.bin_of(v)).collect();
            (mapper, bins)
        });
        let (mappers, columns) = binned.into_iter().unzip();
        Self {
            n_rows,
            mappers,
            columns,
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.mappers.len()
    }

    #[inline]
    pub fn n_bins(&self, feature: usize) -> usize {
        self.mappers[feature].n_bins()
    }

    #[inline]
    pub fn bin_mapper(&self, feature: usize) -> &BinMapper {
        &self.mappers[feature]
    }

    pub fn bin_mappers(&self) -> &[BinMapper] {
        &self.mappers
    }

    /// All bins of one feature, indexed by row.
    #[inline]
    pub fn feature_bins(&self, feature: usize) -> &[u8] {
        &self.columns[feature]
    }

    #[inline]
    pub fn bin(&self, row: usize, feature: usize) -> u8 {
        self.columns[feature][row]
    }
}
