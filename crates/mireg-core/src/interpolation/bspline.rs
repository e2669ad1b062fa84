//! B-Spline interpolation implementation.
//!
//! This module provides interpolating cubic B-Spline sampling: the field is
//! prefiltered once into spline coefficients, so sampling at grid points
//! returns the original values.

use crate::image::ScalarField;
use super::boundary::BoundaryMode;
use super::kernel::{cubic_bspline_weights, AxisTaps};
use super::prefilter::bspline_coefficients;
use super::trait_::{gather, Interpolator};

/// Cubic B-Spline interpolator.
#[derive(Debug, Clone)]
pub struct BSplineInterpolator<const D: usize> {
    coefficients: ScalarField<D>,
    boundary: BoundaryMode,
    fill_value: f64,
}

impl<const D: usize> BSplineInterpolator<D> {
    /// Prefilter `field` and bind the interpolator to the coefficients.
    pub fn new(field: &ScalarField<D>, boundary: BoundaryMode, fill_value: f64) -> Self {
        Self {
            coefficients: bspline_coefficients(field),
            boundary,
            fill_value,
        }
    }
}

impl<const D: usize> Interpolator<D> for BSplineInterpolator<D> {
    fn sample(&self, index: &[f64; D]) -> f64 {
        let size = self.coefficients.size();
        let axes: [AxisTaps; D] = std::array::from_fn(|a| {
            let t = index[a];
            let i0 = t.floor();
            let weights = cubic_bspline_weights(t - i0);
            let i0 = i0 as isize;
            let mut taps = AxisTaps::new();
            for (k, w) in weights.iter().enumerate() {
                taps.push(self.boundary.map_index(i0 - 1 + k as isize, size[a]), *w);
            }
            taps
        });
        gather(&self.coefficients, &axes, self.fill_value)
    }

    fn size(&self) -> [usize; D] {
        self.coefficients.size()
    }
}
