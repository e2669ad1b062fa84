//! Physical distance between neighbouring samples along each axis.

use super::Vector;

/// Spacing between adjacent pixels/voxels along each axis.
///
/// A type alias to [`Vector`] for semantic clarity.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Same spacing on every axis.
    pub fn uniform(value: f64) -> Self {
        Vector::new([value; D])
    }

    /// Smallest spacing value.
    pub fn min_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::INFINITY, f64::min)
    }

    /// Spacing after resampling every axis by `factor` fewer samples.
    pub fn coarsened(&self, factor: f64) -> Self {
        *self * factor
    }

    /// Ratio of this spacing to a finer `reference` spacing, taken on the
    /// axis where the ratio is largest.
    ///
    /// Pyramid levels coarsen all axes by the same factor, so every axis
    /// agrees; the maximum keeps the result meaningful for anisotropic
    /// schedules.
    pub fn ratio_to(&self, reference: &Self) -> f64 {
        (0..D)
            .map(|i| self[i] / reference[i])
            .fold(f64::NEG_INFINITY, f64::max)
    }
}
