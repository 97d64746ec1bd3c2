//! Row partitioning for tree training.
//!
//! All row indices live in one buffer ordered by leaf; each leaf owns a
//! contiguous range. Splitting a leaf partitions its range in place.
//!
//! ```text
//! Initial (all rows in leaf 0):
//!   indices: [0, 1, 2, 3, 4, 5, 6, 7]
//!   leaf_begin: [0], leaf_count: [8]
//!
//! After splitting leaf 0 (rows 0,2,4,6 left, rows 1,3,5,7 right to leaf 1):
//!   indices: [0, 2, 4, 6, 1, 3, 5, 7]
//!   leaf_begin: [0, 4], leaf_count: [4, 4]
//! ```
//!
//! The left side keeps the leaf id and the right side gets the next free id,
//! matching how [`Tree::split`](crate::repr::Tree::split) numbers leaves.

/// Leaf identifier during training.
pub type LeafId = usize;

/// Row indices per leaf.
#[derive(Debug, Clone)]
pub struct RowPartitioner {
    indices: Box<[u32]>,
    leaf_begin: Vec<usize>,
    leaf_count: Vec<usize>,
    n_leaves: usize,
}

impl RowPartitioner {
    pub fn new(n_rows: usize, max_leaves: usize) -> Self {
        Self {
            indices: (0..n_rows as u32).collect(),
            leaf_begin: vec![0; max_leaves],
            leaf_count: vec![0; max_leaves],
            n_leaves: 0,
        }
    }

    /// Put every row back into leaf 0, in row order.
    pub fn reset(&mut self) {
        for (i, idx) in self.indices.iter_mut().enumerate() {
            *idx = i as u32;
        }
        self.leaf_begin.fill(0);
        self.leaf_count.fill(0);
        self.leaf_count[0] = self.indices.len();
        self.n_leaves = 1;
    }

    #[inline]
    pub fn leaf_rows(&self, leaf: LeafId) -> &[u32] {
        let begin = self.leaf_begin[leaf];
        &self.indices[begin..begin + self.leaf_count[leaf]]
    }

    #[inline]
    pub fn leaf_count(&self, leaf: LeafId) -> usize {
        self.leaf_count[leaf]
    }

    #[inline]
    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    /// Split `leaf` so that rows with `bins[row] <= split_bin` stay in it and
    /// the rest move to a new leaf.
    ///
    /// Returns `(right_leaf, left_count, right_count)`.
    pub fn split(&mut self, leaf: LeafId, bins: &[u8], split_bin: u8) -> (LeafId, usize, usize) {
        let begin = self.leaf_begin[leaf];
        let end = begin + self.leaf_count[leaf];

        // Stable for the left side: rows keep their relative order.
        let mut left_end = begin;
        for i in begin..end {
            let row = self.indices[i];
            if bins[row as usize] <= split_bin {
                self.indices.swap(i, left_end);
                left_end += 1;
            }
        }

        let left_count = left_end - begin;
        let right_count = end - left_end;
        self.leaf_count[leaf] = left_count;

        let right_leaf = self.n_leaves;
        self.n_leaves += 1;
        self.leaf_begin[right_leaf] = left_end;
        self.leaf_count[right_leaf] = right_count;

        (right_leaf, left_count, right_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_puts_all_rows_in_root() {
        let mut partitioner = RowPartitioner::new(100, 16);
        partitioner.reset();
        assert_eq!(partitioner.n_leaves(), 1);
        assert_eq!(partitioner.leaf_count(0), 100);
        assert!(partitioner.leaf_rows(0).iter().enumerate().all(|(i, &r)| r == i as u32));
    }

    #[test]
    fn split_partitions_in_place() {
        let bins = [0u8, 1, 0, 1, 0, 1, 0, 1];
        let mut partitioner = RowPartitioner::new(8, 4);
        partitioner.reset();

        let (right, left_count, right_count) = partitioner.split(0, &bins, 0);
        assert_eq!((right, left_count, right_count), (1, 4, 4));
        assert_eq!(partitioner.leaf_rows(0), &[0, 2, 4, 6]);
        let mut right_rows = partitioner.leaf_rows(1).to_vec();
        right_rows.sort_unstable();
        assert_eq!(right_rows, vec![1, 3, 5, 7]);

        let second = [0u8, 0, 1, 0, 0, 0, 1, 0];
        let (right2, l2, r2) = partitioner.split(0, &second, 0);
        assert_eq!((right2, l2, r2), (2, 2, 2));
        assert_eq!(partitioner.leaf_rows(0), &[0, 4]);
        assert_eq!(partitioner.leaf_count(1), 4);
    }

    #[test]
    fn reset_after_split() {
        let mut partitioner = RowPartitioner::new(4, 4);
        partitioner.reset();
        partitioner.split(0, &[1, 0, 1, 0], 0);
        partitioner.reset();
        assert_eq!(partitioner.leaf_rows(0), &[0, 1, 2, 3]);
        assert_eq!(partitioner.n_leaves(), 1);
    }
}
