//! Shapes, offsets and regions in global index space.

use crate::error::{ArrayError, Result};
use std::fmt;

/// Extent of an array along each dimension.
pub type Shape<const R: usize> = [usize; R];

/// Index of a cell, or of the first cell of a block.
pub type Offset<const R: usize> = [usize; R];

/// Number of elements in an array with the given shape.
pub fn nr_elements<const R: usize>(shape: &Shape<R>) -> usize {
    shape.iter().product()
}

/// Row-major linear index of `idx` within `shape`.
pub fn linear_index<const R: usize>(shape: &Shape<R>, idx: &Offset<R>) -> usize {
    let mut linear = 0;
    for d in 0..R {
        linear = linear * shape[d] + idx[d];
    }
    linear
}

/// Inverse of [`linear_index`].
pub fn index_from_linear<const R: usize>(shape: &Shape<R>, mut linear: usize) -> Offset<R> {
    let mut idx = [0; R];
    for d in (0..R).rev() {
        idx[d] = linear % shape[d];
        linear /= shape[d];
    }
    idx
}

/// Validates that `partition_shape` tiles `shape` exactly and returns
/// the shape of the grid of partitions.
pub fn partition_grid_shape<const R: usize>(
    shape: &Shape<R>,
    partition_shape: &Shape<R>,
) -> Result<Shape<R>> {
    if R == 0 {
        return Err(ArrayError::configuration("arrays of rank 0 are not supported"));
    }

    let mut grid = [0; R];
    for d in 0..R {
        if shape[d] == 0 || partition_shape[d] == 0 {
            return Err(ArrayError::configuration(format!(
                "array shape {:?} and partition shape {:?} must not be empty",
                shape, partition_shape
            )));
        }
        if shape[d] % partition_shape[d] != 0 {
            return Err(ArrayError::configuration(format!(
                "partition shape {:?} does not tile array shape {:?} along dimension {}",
                partition_shape, shape, d
            )));
        }
        grid[d] = shape[d] / partition_shape[d];
    }

    Ok(grid)
}

/// A rectangular block of cells in global index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region<const R: usize> {
    pub offset: Offset<R>,
    pub shape: Shape<R>,
}

impl<const R: usize> Region<R> {
    /// Create a new region.
    pub fn new(offset: Offset<R>, shape: Shape<R>) -> Self {
        Self { offset, shape }
    }

    /// Region covering a whole array of the given shape.
    pub fn whole(shape: Shape<R>) -> Self {
        Self {
            offset: [0; R],
            shape,
        }
    }

    /// Number of cells in the region.
    pub fn nr_elements(&self) -> usize {
        nr_elements(&self.shape)
    }

    /// Check if the region contains no cells.
    pub fn is_empty(&self) -> bool {
        self.nr_elements() == 0
    }

    /// Exclusive end index along each dimension.
    pub fn end(&self) -> Offset<R> {
        let mut end = [0; R];
        for d in 0..R {
            end[d] = self.offset[d] + self.shape[d];
        }
        end
    }

    /// Whether the cell lies within this region.
    pub fn contains(&self, idx: &Offset<R>) -> bool {
        (0..R).all(|d| idx[d] >= self.offset[d] && idx[d] < self.offset[d] + self.shape[d])
    }

    /// Whether `other` lies completely within this region.
    pub fn contains_region(&self, other: &Region<R>) -> bool {
        let end = self.end();
        let other_end = other.end();
        (0..R).all(|d| other.offset[d] >= self.offset[d] && other_end[d] <= end[d])
    }

    /// Overlap of two regions, `None` if they are disjoint.
    pub fn intersection(&self, other: &Region<R>) -> Option<Region<R>> {
        let end = self.end();
        let other_end = other.end();
        let mut offset = [0; R];
        let mut shape = [0; R];

        for d in 0..R {
            let start = self.offset[d].max(other.offset[d]);
            let stop = end[d].min(other_end[d]);
            if start >= stop {
                return None;
            }
            offset[d] = start;
            shape[d] = stop - start;
        }

        Some(Region { offset, shape })
    }

    /// Linear index of a global cell relative to this region.
    pub fn local_linear_index(&self, idx: &Offset<R>) -> usize {
        let mut local = [0; R];
        for d in 0..R {
            local[d] = idx[d] - self.offset[d];
        }
        linear_index(&self.shape, &local)
    }
}

impl<const R: usize> fmt::Display for Region<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}+{:?}", self.offset, self.shape)
    }
}

/// Copies the cells of `overlap` from a buffer laid out as `src_region`
/// into a buffer laid out as `dst_region`.
///
/// Both regions must contain `overlap`. Runs along the last dimension are
/// copied as contiguous slices.
pub fn copy_region<T: Copy, const R: usize>(
    src: &[T],
    src_region: &Region<R>,
    dst: &mut [T],
    dst_region: &Region<R>,
    overlap: &Region<R>,
) {
    if R == 0 || overlap.is_empty() {
        return;
    }

    let run = overlap.shape[R - 1];
    let nr_runs = overlap.nr_elements() / run;
    let mut outer_shape = overlap.shape;
    outer_shape[R - 1] = 1;

    for r in 0..nr_runs {
        let outer = index_from_linear(&outer_shape, r);
        let mut idx = [0; R];
        for d in 0..R {
            idx[d] = overlap.offset[d] + outer[d];
        }

        let src_start = src_region.local_linear_index(&idx);
        let dst_start = dst_region.local_linear_index(&idx);
        dst[dst_start..dst_start + run].copy_from_slice(&src[src_start..src_start + run]);
    }
}
