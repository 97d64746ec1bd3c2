//! Query group boundaries.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Contiguous query groups over a flat row array, stored as boundaries.
///
/// Group `g` owns rows `boundaries[g]..boundaries[g + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryGroups {
    boundaries: Vec<usize>,
}

impl QueryGroups {
    /// Build from a sequence of group sizes.
    pub fn from_sizes(sizes: &[u32]) -> Self {
        let mut boundaries = Vec::with_capacity(sizes.len() + 1);
        boundaries.push(0);
        let mut end = 0usize;
        for &size in sizes {
            end += size as usize;
            boundaries.push(end);
        }
        Self { boundaries }
    }

    /// A single group spanning `n_rows` rows.
    pub fn single(n_rows: usize) -> Self {
        Self {
            boundaries: vec![0, n_rows],
        }
    }

    #[inline]
    pub fn n_groups(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.boundaries.last().copied().unwrap_or(0)
    }

    #[inline]
    pub fn range(&self, group: usize) -> Range<usize> {
        self.boundaries[group]..self.boundaries[group + 1]
    }

    /// Row ranges in group order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Range<usize>> + '_ {
        self.boundaries.windows(2).map(|w| w[0]..w[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_from_sizes() {
        let groups = QueryGroups::from_sizes(&[3, 2, 4]);
        assert_eq!(groups.n_groups(), 3);
        assert_eq!(groups.n_rows(), 9);
        assert_eq!(groups.range(1), 3..5);
        assert_eq!(groups.iter().collect::<Vec<_>>(), vec![0..3, 3..5, 5..9]);
    }

    #[test]
    fn empty_groups() {
        let groups = QueryGroups::from_sizes(&[]);
        assert_eq!(groups.n_groups(), 0);
        assert_eq!(groups.n_rows(), 0);
        assert_eq!(groups.iter().len(), 0);
    }
}
