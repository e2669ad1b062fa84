//! Nearest neighbor interpolation.

use crate::image::ScalarField;
use super::boundary::BoundaryMode;
use super::kernel::AxisTaps;
use super::trait_::{gather, Interpolator};

/// Nearest Neighbor Interpolator.
///
/// Rounds each coordinate half-up to the closest sample.
#[derive(Debug, Clone)]
pub struct NearestNeighborInterpolator<const D: usize> {
    field: ScalarField<D>,
    boundary: BoundaryMode,
    fill_value: f64,
}

impl<const D: usize> NearestNeighborInterpolator<D> {
    pub fn new(field: ScalarField<D>, boundary: BoundaryMode, fill_value: f64) -> Self {
        Self { field, boundary, fill_value }
    }
}

impl<const D: usize> Interpolator<D> for NearestNeighborInterpolator<D> {
    fn sample(&self, index: &[f64; D]) -> f64 {
        let size = self.field.size();
        let axes: [AxisTaps; D] = std::array::from_fn(|a| {
            let mut taps = AxisTaps::new();
            let i = (index[a] + 0.5).floor() as isize;
            taps.push(self.boundary.map_index(i, size[a]), 1.0);
            taps
        });
        gather(&self.field, &axes, self.fill_value)
    }

    fn size(&self) -> [usize; D] {
        self.field.size()
    }
}
