//! Gradient and hessian buffers.

use std::ops::Range;

use crate::data::QueryGroups;

/// Per-row first and second order gradients, stored as two parallel arrays.
///
/// Histogram building reads both arrays sequentially, so they are kept
/// separate instead of interleaved.
#[derive(Debug, Clone)]
pub struct Gradients {
    grads: Vec<f32>,
    hess: Vec<f32>,
}

/// Mutable gradient slices of one query group.
pub struct GroupGradients<'a> {
    pub rows: Range<usize>,
    pub grads: &'a mut [f32],
    pub hess: &'a mut [f32],
}

impl Gradients {
    pub fn new(n_rows: usize) -> Self {
        Self {
            grads: vec![0.0; n_rows],
            hess: vec![0.0; n_rows],
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.grads.len()
    }

    pub fn reset(&mut self) {
        self.grads.fill(0.0);
        self.hess.fill(0.0);
    }

    #[inline]
    pub fn grads(&self) -> &[f32] {
        &self.grads
    }

    #[inline]
    pub fn hess(&self) -> &[f32] {
        &self.hess
    }

    /// Both buffers mutably.
    #[inline]
    pub fn pairs_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.grads, &mut self.hess)
    }

    /// Split the buffers into disjoint per-group slices.
    ///
    /// Groups must tile the rows contiguously from row 0.
    pub fn group_chunks_mut(&mut self, groups: &QueryGroups) -> Vec<GroupGradients<'_>> {
        let mut chunks = Vec::with_capacity(groups.n_groups());
        let mut grads: &mut [f32] = &mut self.grads;
        let mut hess: &mut [f32] = &mut self.hess;
        for rows in groups.iter() {
            let (g_head, g_tail) = std::mem::take(&mut grads).split_at_mut(rows.len());
            let (h_head, h_tail) = std::mem::take(&mut hess).split_at_mut(rows.len());
            grads = g_tail;
            hess = h_tail;
            chunks.push(GroupGradients {
                rows,
                grads: g_head,
                hess: h_head,
            });
        }
        chunks
    }

    /// Sum of gradients and hessians over the given rows.
    pub fn sum(&self, rows: &[u32]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &r| {
            (g + self.grads[r as usize] as f64, h + self.hess[r as usize] as f64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_chunks_are_disjoint() {
        let mut gradients = Gradients::new(5);
        let groups = QueryGroups::from_sizes(&[2, 3]);
        for (i, chunk) in gradients.group_chunks_mut(&groups).into_iter().enumerate() {
            chunk.grads.fill(i as f32 + 1.0);
            chunk.hess.fill(0.5);
        }
        assert_eq!(gradients.grads(), &[1.0, 1.0, 2.0, 2.0, 2.0]);
        let (g, h) = gradients.sum(&[0, 2, 4]);
        assert_eq!(g, 5.0);
        assert_eq!(h, 1.5);
    }
}
