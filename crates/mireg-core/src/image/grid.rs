//! Row-major sample grids.
//!
//! Axis order follows the tensor layout: the last axis varies fastest.

use crate::error::{CoreError, Result};

/// Size and strides of a D-dimensional row-major grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grid<const D: usize> {
    size: [usize; D],
    strides: [usize; D],
}

impl<const D: usize> Grid<D> {
    /// Create a grid, rejecting empty axes.
    pub fn new(size: [usize; D]) -> Result<Self> {
        if D == 0 {
            return Err(CoreError::invalid_size("grids need at least one axis"));
        }
        if let Some(axis) = size.iter().position(|&n| n == 0) {
            return Err(CoreError::invalid_size(format!("axis {axis} of {size:?} is empty")));
        }
        let mut strides = [1usize; D];
        for a in (0..D - 1).rev() {
            strides[a] = strides[a + 1]
                .checked_mul(size[a + 1])
                .ok_or_else(|| CoreError::invalid_size(format!("{size:?} overflows")))?;
        }
        strides[0]
            .checked_mul(size[0])
            .ok_or_else(|| CoreError::invalid_size(format!("{size:?} overflows")))?;
        Ok(Self { size, strides })
    }

    /// Number of samples along each axis.
    pub fn size(&self) -> [usize; D] {
        self.size
    }

    /// Linear distance between neighbours along each axis.
    pub fn strides(&self) -> [usize; D] {
        self.strides
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.size.iter().product()
    }

    /// Grids always hold at least one sample.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Length of one line along the fastest axis.
    pub fn row_len(&self) -> usize {
        self.size[D - 1]
    }

    /// Linear index of a multi-index.
    pub fn linear_index(&self, index: &[usize; D]) -> usize {
        index.iter().zip(self.strides.iter()).map(|(i, s)| i * s).sum()
    }

    /// Multi-index of a linear index.
    pub fn index_of(&self, mut linear: usize) -> [usize; D] {
        let mut index = [0usize; D];
        for a in 0..D {
            index[a] = linear / self.strides[a];
            linear %= self.strides[a];
        }
        index
    }

    /// True if the index is at least one sample away from every face.
    pub fn is_interior(&self, index: &[usize; D]) -> bool {
        index
            .iter()
            .zip(self.size.iter())
            .all(|(&i, &n)| i > 0 && i + 1 < n)
    }

    /// Ensure another grid has the same size.
    pub fn check_same(&self, other: &Grid<D>) -> Result<()> {
        if self.size != other.size {
            return Err(CoreError::shape_mismatch(&self.size, &other.size));
        }
        Ok(())
    }

    /// Per-axis factor that maps an index of this grid onto a finer grid of `size`.
    ///
    /// Pyramid halving keeps samples `0, 2, 4, ...`, so an axis of `n` samples
    /// comes from `2n - 1` or `2n` samples and coarse index `x` sits at fine
    /// index `2x`. Any other size counts as a plain resize by `n' / n`.
    pub fn upsampling_factor(&self, size: &[usize; D]) -> [f64; D] {
        std::array::from_fn(|a| {
            let (n, fine) = (self.size[a], size[a]);
            if fine > n && fine.div_ceil(2) == n {
                2.0
            } else {
                fine as f64 / n as f64
            }
        })
    }
}
