//! Linear interpolation implementation.
//!
//! Bilinear for 2D, trilinear for 3D; one generic implementation for any `D`.

use crate::image::ScalarField;
use super::boundary::BoundaryMode;
use super::kernel::AxisTaps;
use super::trait_::{gather, Interpolator};

/// Linear Interpolator.
#[derive(Debug, Clone)]
pub struct LinearInterpolator<const D: usize> {
    field: ScalarField<D>,
    boundary: BoundaryMode,
    fill_value: f64,
}

impl<const D: usize> LinearInterpolator<D> {
    /// Create a new linear interpolator over `field`.
    pub fn new(field: ScalarField<D>, boundary: BoundaryMode, fill_value: f64) -> Self {
        Self { field, boundary, fill_value }
    }
}

impl<const D: usize> Interpolator<D> for LinearInterpolator<D> {
    fn sample(&self, index: &[f64; D]) -> f64 {
        let size = self.field.size();
        let axes: [AxisTaps; D] = std::array::from_fn(|a| {
            let t = index[a];
            let i0 = t.floor();
            let f = t - i0;
            let i0 = i0 as isize;
            let mut taps = AxisTaps::new();
            taps.push(self.boundary.map_index(i0, size[a]), 1.0 - f);
            if f > 0.0 {
                taps.push(self.boundary.map_index(i0 + 1, size[a]), f);
            }
            taps
        });
        gather(&self.field, &axes, self.fill_value)
    }

    fn size(&self) -> [usize; D] {
        self.field.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Grid;

    #[test]
    fn test_bilinear_midpoint() {
        let grid = Grid::new([2, 2]).unwrap();
        let field = ScalarField::new(grid, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let interp = LinearInterpolator::new(field, BoundaryMode::Mirror, 0.0);
        assert!((interp.sample(&[0.5, 0.5]) - 1.5).abs() < 1e-12);
        assert!((interp.sample(&[0.0, 0.25]) - 0.25).abs() < 1e-12);
        assert!((interp.sample(&[1.0, 1.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_reproduces_linear_function_inside() {
        let grid = Grid::new([4, 5, 6]).unwrap();
        let field = ScalarField::from_fn(grid, |[z, y, x]| {
            2.0 * z as f64 - y as f64 + 0.5 * x as f64
        });
        let interp = LinearInterpolator::new(field, BoundaryMode::Constant, 0.0);
        let p = [1.3, 2.7, 4.1];
        let expected = 2.0 * p[0] - p[1] + 0.5 * p[2];
        assert!((interp.sample(&p) - expected).abs() < 1e-12);
    }
}
