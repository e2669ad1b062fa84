//! Cubic B-spline free-form deformation.
//!
//! The displacement is a tensor product of cubic B-splines on a uniform knot
//! grid. With `K` knot intervals over an extent of `E` samples, sample `x`
//! sits at spline coordinate `t = x K / E + 1` and is influenced by the four
//! coefficients `floor(t) - 1 ..= floor(t) + 2`, so an axis carries `K + 3`
//! coefficients. A fresh transformation spans its grid (`E = n`); upscaling
//! multiplies the extent by the sampling factor, which can leave it one sample
//! past an odd-sized grid.

use std::sync::Arc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};
use crate::image::{Grid, VectorField};
use crate::interpolation::{cubic_bspline_weights, for_each_tap, ResamplingConfig};
use super::trait_::{Transformation, TransformationFactory};

/// Smoothness energy of the coefficient grid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SplinePenalty {
    /// Squared first differences.
    Membrane,
    /// Squared discrete Laplacian.
    #[default]
    Bending,
    /// Squared gradients of the divergence and of the rotation.
    DivCurl { divergence: f64, rotation: f64 },
}

impl SplinePenalty {
    /// Parse a penalty name (`membrane`, `bending`, `divcurl`); div/curl
    /// starts with unit weights.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "membrane" => Some(Self::Membrane),
            "bending" => Some(Self::Bending),
            "divcurl" => Some(Self::DivCurl {
                divergence: 1.0,
                rotation: 1.0,
            }),
            _ => None,
        }
    }

    /// Derivative order of the energy.
    pub fn order(&self) -> usize {
        match self {
            Self::Membrane => 1,
            Self::Bending | Self::DivCurl { .. } => 2,
        }
    }
}

/// Parameters of the spline family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplineConfig {
    /// Knot spacing in samples.
    pub rate: f64,
    /// Weight of the coefficient smoothness penalty (0 disables it).
    pub penalty_weight: f64,
    pub penalty: SplinePenalty,
}

impl Default for SplineConfig {
    fn default() -> Self {
        Self {
            rate: 8.0,
            penalty_weight: 0.0,
            penalty: SplinePenalty::Bending,
        }
    }
}

impl SplineConfig {
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_penalty(mut self, weight: f64, penalty: SplinePenalty) -> Self {
        self.penalty_weight = weight;
        self.penalty = penalty;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(CoreError::invalid_parameter(format!(
                "spline rate must be positive, got {}",
                self.rate
            )));
        }
        if !(self.penalty_weight.is_finite() && self.penalty_weight >= 0.0) {
            return Err(CoreError::invalid_parameter(format!(
                "spline penalty weight must be non-negative, got {}",
                self.penalty_weight
            )));
        }
        if let SplinePenalty::DivCurl { divergence, rotation } = self.penalty {
            let valid = |w: f64| w.is_finite() && w >= 0.0;
            if !(valid(divergence) && valid(rotation) && divergence + rotation > 0.0) {
                return Err(CoreError::invalid_parameter(format!(
                    "div/curl weights must be non-negative and not both zero, got {divergence} and {rotation}"
                )));
            }
        }
        Ok(())
    }
}

/// Number of knot intervals covering `n` samples at the given knot spacing.
pub fn knot_intervals(n: usize, rate: f64) -> usize {
    ((n as f64 / rate).ceil() as usize).max(1)
}

/// Precomputed basis weights along one axis.
#[derive(Debug)]
struct AxisTable {
    /// Per sample: first coefficient index and the four weights.
    forward: Vec<(usize, [f64; 4])>,
    /// Per coefficient: the samples it influences and their weights.
    inverse: Vec<Vec<(usize, f64)>>,
}

impl AxisTable {
    /// Requires `extent >= n` so every sample stays below the last knot.
    fn new(n: usize, intervals: usize, extent: f64) -> Self {
        let mut inverse = vec![Vec::new(); intervals + 3];
        let forward = (0..n)
            .map(|x| {
                let t = x as f64 * intervals as f64 / extent + 1.0;
                let i = t.floor();
                let weights = cubic_bspline_weights(t - i);
                let start = i as usize - 1;
                for (k, w) in weights.iter().enumerate() {
                    if *w != 0.0 {
                        inverse[start + k].push((x, *w));
                    }
                }
                (start, weights)
            })
            .collect();
        Self { forward, inverse }
    }
}

/// Cubic B-spline transformation.
#[derive(Debug, Clone)]
pub struct SplineTransformation<const D: usize> {
    grid: Grid<D>,
    intervals: [usize; D],
    /// Samples covered by the knot intervals along each axis.
    extent: [f64; D],
    coefficients: VectorField<D>,
    tables: Arc<[AxisTable; D]>,
    displacement: VectorField<D>,
    resampling: ResamplingConfig,
    penalty_weight: f64,
    penalty: SplinePenalty,
    penalty_scale: f64,
}

impl<const D: usize> SplineTransformation<D> {
    /// Identity on a grid of `size`.
    pub fn identity(size: [usize; D], config: &SplineConfig, resampling: ResamplingConfig) -> Result<Self> {
        config.validate()?;
        let grid = Grid::new(size)?;
        let intervals = size.map(|n| knot_intervals(n, config.rate));
        let coefficients = VectorField::zeros(Grid::new(intervals.map(|k| k + 3))?);
        let extent = size.map(|n| n as f64);
        Self::from_parts(grid, intervals, extent, coefficients, resampling, config.penalty_weight, config.penalty)
    }

    fn from_parts(
        grid: Grid<D>,
        intervals: [usize; D],
        extent: [f64; D],
        coefficients: VectorField<D>,
        resampling: ResamplingConfig,
        penalty_weight: f64,
        penalty: SplinePenalty,
    ) -> Result<Self> {
        let size = grid.size();
        let tables: [AxisTable; D] = std::array::from_fn(|a| AxisTable::new(size[a], intervals[a], extent[a]));
        let tables = Arc::new(tables);
        let displacement = evaluate(&grid, &tables, &coefficients)?;
        Ok(Self {
            grid,
            intervals,
            extent,
            coefficients,
            tables,
            displacement,
            resampling,
            penalty_weight,
            penalty,
            penalty_scale: 1.0,
        })
    }

    /// Knot intervals per axis.
    pub fn intervals(&self) -> [usize; D] {
        self.intervals
    }

    /// Samples spanned by the knot intervals per axis.
    pub fn extent(&self) -> [f64; D] {
        self.extent
    }

    /// Coefficients on the `K + 3` coefficient grid.
    pub fn coefficients(&self) -> &VectorField<D> {
        &self.coefficients
    }
}

/// Displacement at every sample of `grid`.
fn evaluate<const D: usize>(
    grid: &Grid<D>,
    tables: &[AxisTable; D],
    coefficients: &VectorField<D>,
) -> Result<VectorField<D>> {
    let coefficient_grid = *coefficients.grid();
    let c = coefficients.values();
    let values = (0..grid.len())
        .into_par_iter()
        .map(|i| {
            let index = grid.index_of(i);
            let taps: [[(usize, f64); 4]; D] = std::array::from_fn(|a| {
                let (start, w) = tables[a].forward[index[a]];
                std::array::from_fn(|k| (start + k, w[k]))
            });
            let slices: [&[(usize, f64)]; D] = std::array::from_fn(|a| &taps[a][..]);
            let mut u = [0.0; D];
            for_each_tap(&slices, |j, weight| {
                let cj = &c[coefficient_grid.linear_index(j)];
                for a in 0..D {
                    u[a] += weight * cj[a];
                }
            });
            u
        })
        .collect();
    VectorField::new(*grid, values)
}

/// Halve the knot spacing along `axis` by exact cubic B-spline subdivision.
fn refine_axis<const D: usize>(coefficients: &VectorField<D>, axis: usize) -> Result<VectorField<D>> {
    const MASK: [f64; 5] = [0.125, 0.5, 0.75, 0.5, 0.125];
    let old = *coefficients.grid();
    let old_len = old.size()[axis];
    let mut size = old.size();
    size[axis] = 2 * (old_len - 3) + 3;
    let grid = Grid::new(size)?;
    let c = coefficients.values();
    let values = (0..grid.len())
        .into_par_iter()
        .map(|i| {
            let mut index = grid.index_of(i);
            let fine = index[axis] as isize;
            let mut out = [0.0; D];
            for (m, w) in MASK.iter().enumerate() {
                let shifted = fine + 1 - (m as isize - 2);
                if shifted.rem_euclid(2) != 0 {
                    continue;
                }
                let j = shifted / 2;
                if j < 0 || j >= old_len as isize {
                    continue;
                }
                index[axis] = j as usize;
                let cj = &c[old.linear_index(&index)];
                for a in 0..D {
                    out[a] += w * cj[a];
                }
            }
            out
        })
        .collect();
    VectorField::new(grid, values)
}

impl<const D: usize> Transformation<D> for SplineTransformation<D> {
    fn name(&self) -> &str {
        "spline"
    }

    fn size(&self) -> [usize; D] {
        self.grid.size()
    }

    fn degrees_of_freedom(&self) -> usize {
        self.coefficients.grid().len() * D
    }

    fn parameters(&self) -> Vec<f64> {
        self.coefficients.to_flat()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        let coefficients = VectorField::from_flat(*self.coefficients.grid(), parameters)?;
        self.displacement = evaluate(&self.grid, &self.tables, &coefficients)?;
        self.coefficients = coefficients;
        Ok(())
    }

    fn displacement_field(&self) -> &VectorField<D> {
        &self.displacement
    }

    fn resampling(&self) -> &ResamplingConfig {
        &self.resampling
    }

    fn gradient(&self, force: &VectorField<D>) -> Result<Vec<f64>> {
        self.grid.check_same(force.grid())?;
        let coefficient_grid = *self.coefficients.grid();
        let forces = force.values();
        let grid = self.grid;
        let tables = &self.tables;
        let per_coefficient: Vec<[f64; D]> = (0..coefficient_grid.len())
            .into_par_iter()
            .map(|j| {
                let index = coefficient_grid.index_of(j);
                let slices: [&[(usize, f64)]; D] =
                    std::array::from_fn(|a| tables[a].inverse[index[a]].as_slice());
                let mut g = [0.0; D];
                for_each_tap(&slices, |x, weight| {
                    let f = &forces[grid.linear_index(x)];
                    for a in 0..D {
                        g[a] += weight * f[a];
                    }
                });
                g
            })
            .collect();
        Ok(per_coefficient.into_iter().flatten().collect())
    }

    fn upscale(&self, size: [usize; D]) -> Result<Box<dyn Transformation<D>>> {
        let grid = Grid::new(size)?;
        let factor = self.grid.upsampling_factor(&size);

        // Doubling axes get exact knot subdivision, so t' = 2t - 1 at x' = 2x
        // and the knot spacing in samples is unchanged; other axes keep their
        // knots and only stretch the extent.
        let mut intervals = self.intervals;
        let mut coefficients = self.coefficients.clone();
        for a in 0..D {
            if factor[a] == 2.0 {
                coefficients = refine_axis(&coefficients, a)?;
                intervals[a] *= 2;
            }
        }
        for c in coefficients.values_mut() {
            for a in 0..D {
                c[a] *= factor[a];
            }
        }
        let extent: [f64; D] = std::array::from_fn(|a| self.extent[a] * factor[a]);
        tracing::debug!(from = ?self.grid.size(), to = ?size, ?intervals, "upscaling spline");
        let upscaled = Self::from_parts(
            grid,
            intervals,
            extent,
            coefficients,
            self.resampling,
            self.penalty_weight,
            self.penalty,
        )?;
        Ok(Box::new(upscaled))
    }

    fn clone_box(&self) -> Box<dyn Transformation<D>> {
        Box::new(self.clone())
    }

    fn has_energy_penalty(&self) -> bool {
        self.penalty_weight > 0.0
    }

    fn penalty_order(&self) -> usize {
        if self.has_energy_penalty() {
            self.penalty.order()
        } else {
            0
        }
    }

    fn set_penalty_scale(&mut self, scale: f64) {
        self.penalty_scale = scale;
    }

    /// Membrane (`sum |c[k + e_a] - c[k]|^2`), bending
    /// (`sum |laplacian c[k]|^2` over interior coefficients) or div/curl
    /// energy of the coefficient grid, normalized by the number of
    /// coefficients.
    fn energy_penalty(&self, gradient: Option<&mut [f64]>) -> f64 {
        if !self.has_energy_penalty() {
            return 0.0;
        }
        let grid = *self.coefficients.grid();
        let size = grid.size();
        let strides = grid.strides();
        let c = self.coefficients.values();
        let factor = self.penalty_weight * self.penalty_scale / grid.len() as f64;
        let mut gradient = gradient;
        if let Some(g) = gradient.as_deref() {
            debug_assert_eq!(g.len(), self.degrees_of_freedom());
        }

        let energy = match self.penalty {
            SplinePenalty::Membrane => {
                let mut energy = 0.0;
                for k in 0..grid.len() {
                    let index = grid.index_of(k);
                    for a in 0..D {
                        if index[a] + 1 >= size[a] {
                            continue;
                        }
                        let n = k + strides[a];
                        for comp in 0..D {
                            let d = c[n][comp] - c[k][comp];
                            energy += d * d;
                            if let Some(g) = gradient.as_deref_mut() {
                                g[k * D + comp] -= 2.0 * factor * d;
                                g[n * D + comp] += 2.0 * factor * d;
                            }
                        }
                    }
                }
                energy
            }
            SplinePenalty::Bending => {
                let mut energy = 0.0;
                let center = 2.0 * D as f64;
                for k in 0..grid.len() {
                    if !grid.is_interior(&grid.index_of(k)) {
                        continue;
                    }
                    for comp in 0..D {
                        let mut r = -center * c[k][comp];
                        for a in 0..D {
                            r += c[k + strides[a]][comp] + c[k - strides[a]][comp];
                        }
                        energy += r * r;
                        if let Some(g) = gradient.as_deref_mut() {
                            let s = 2.0 * factor * r;
                            g[k * D + comp] -= s * center;
                            for a in 0..D {
                                g[(k + strides[a]) * D + comp] += s;
                                g[(k - strides[a]) * D + comp] += s;
                            }
                        }
                    }
                }
                energy
            }
            SplinePenalty::DivCurl { divergence, rotation } => {
                divcurl_energy(&grid, c, divergence, rotation, factor, gradient)
            }
        };
        factor * energy
    }
}

/// `sum divergence |grad div c|^2 + rotation |grad rot c|^2` over interior
/// coefficients, with central second differences. `rot` has one component
/// per axis pair. The gradient is scaled by `factor`, the result is not.
fn divcurl_energy<const D: usize>(
    grid: &Grid<D>,
    c: &[[f64; D]],
    divergence: f64,
    rotation: f64,
    factor: f64,
    mut gradient: Option<&mut [f64]>,
) -> f64 {
    let strides = grid.strides().map(|s| s as isize);
    // second[p * D + q]: taps of d^2 / dx_p dx_q as (linear offset, weight)
    let second: Vec<Vec<(isize, f64)>> = (0..D * D)
        .map(|pq| {
            let (sp, sq) = (strides[pq / D], strides[pq % D]);
            if pq / D == pq % D {
                vec![(sp, 1.0), (0, -2.0), (-sp, 1.0)]
            } else {
                vec![(sp + sq, 0.25), (sp - sq, -0.25), (sq - sp, -0.25), (-sp - sq, 0.25)]
            }
        })
        .collect();

    let mut energy = 0.0;
    let mut terms: Vec<(usize, isize, f64)> = Vec::new();
    for k in 0..grid.len() {
        if !grid.is_interior(&grid.index_of(k)) {
            continue;
        }
        for axis in 0..D {
            terms.clear();
            for comp in 0..D {
                terms.extend(second[axis * D + comp].iter().map(|&(o, w)| (comp, o, w)));
            }
            energy += add_residual(c, k, &terms, divergence, factor, gradient.as_deref_mut());

            for a in 0..D {
                for b in a + 1..D {
                    terms.clear();
                    terms.extend(second[axis * D + a].iter().map(|&(o, w)| (b, o, w)));
                    terms.extend(second[axis * D + b].iter().map(|&(o, w)| (a, o, -w)));
                    energy += add_residual(c, k, &terms, rotation, factor, gradient.as_deref_mut());
                }
            }
        }
    }
    energy
}

/// Weighted square of the residual `sum w c[k + o][comp]`; its derivative,
/// times `factor`, goes into `gradient`.
fn add_residual<const D: usize>(
    c: &[[f64; D]],
    k: usize,
    terms: &[(usize, isize, f64)],
    weight: f64,
    factor: f64,
    gradient: Option<&mut [f64]>,
) -> f64 {
    let at = |o: isize| (k as isize + o) as usize;
    let r: f64 = terms.iter().map(|&(comp, o, w)| w * c[at(o)][comp]).sum();
    if let Some(g) = gradient {
        let s = 2.0 * factor * weight * r;
        for &(comp, o, w) in terms {
            g[at(o) * D + comp] += s * w;
        }
    }
    weight * r * r
}

/// Creates [`SplineTransformation`] identities.
#[derive(Debug, Clone, Default)]
pub struct SplineFactory {
    pub config: SplineConfig,
    pub resampling: ResamplingConfig,
}

impl SplineFactory {
    pub fn new(config: SplineConfig, resampling: ResamplingConfig) -> Self {
        Self { config, resampling }
    }
}

impl<const D: usize> TransformationFactory<D> for SplineFactory {
    fn name(&self) -> &str {
        "spline"
    }

    fn identity(&self, size: [usize; D]) -> Result<Box<dyn Transformation<D>>> {
        Ok(Box::new(SplineTransformation::identity(size, &self.config, self.resampling)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn values(n: usize) -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(-0.5f64..0.5, n)
    }

    fn coincident_error(coarse: &dyn Transformation<2>, fine: &dyn Transformation<2>) -> f64 {
        let [h, w] = coarse.size();
        let mut worst: f64 = 0.0;
        for y in 0..h {
            for x in 0..w {
                let u = coarse.displacement_field().at(&[y, x]);
                let v = fine.displacement_field().at(&[2 * y, 2 * x]);
                worst = worst.max((v[0] - 2.0 * u[0]).abs()).max((v[1] - 2.0 * u[1]).abs());
            }
        }
        worst
    }

    #[test]
    fn test_identity_layout() {
        let t = SplineTransformation::identity([64, 40], &SplineConfig::default(), ResamplingConfig::default())
            .unwrap();
        assert_eq!(t.intervals(), [8, 5]);
        assert_eq!(t.extent(), [64.0, 40.0]);
        assert_eq!(t.coefficients().size(), [11, 8]);
        assert_eq!(t.degrees_of_freedom(), 11 * 8 * 2);
        assert_eq!(t.displacement_field().max_norm(), 0.0);
    }

    #[test]
    fn test_constant_coefficients_give_constant_displacement() {
        let mut t = SplineTransformation::identity([20, 17], &SplineConfig::default(), ResamplingConfig::default())
            .unwrap();
        let p: Vec<f64> = (0..t.degrees_of_freedom())
            .map(|i| if i % 2 == 0 { 1.5 } else { -0.25 })
            .collect();
        t.set_parameters(&p).unwrap();
        for u in t.displacement_field().values() {
            assert!((u[0] - 1.5).abs() < 1e-12);
            assert!((u[1] + 0.25).abs() < 1e-12);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // [23, 18] at rate 5 has 8 x 7 coefficients.
        #[test]
        fn test_gradient_is_adjoint(p in values(8 * 7 * 2), f in values(23 * 18 * 2)) {
            let config = SplineConfig::default().with_rate(5.0);
            let mut t = SplineTransformation::identity([23, 18], &config, ResamplingConfig::default()).unwrap();
            t.set_parameters(&p).unwrap();
            let force = VectorField::from_flat(*t.displacement_field().grid(), &f).unwrap();

            let g = t.gradient(&force).unwrap();
            let lhs: f64 = g.iter().zip(&p).map(|(a, b)| a * b).sum();
            let rhs = force.dot(t.displacement_field()).unwrap();
            prop_assert!((lhs - rhs).abs() < 1e-9 * rhs.abs().max(1.0));
        }

        // [13, 12] at rate 4 has 7 x 6 coefficients; the first axis is odd
        // after upscaling, the second even.
        #[test]
        fn test_upscale_reproduces_coincident_points(p in values(7 * 6 * 2)) {
            let config = SplineConfig::default().with_rate(4.0);
            let mut t = SplineTransformation::identity([13, 12], &config, ResamplingConfig::default()).unwrap();
            t.set_parameters(&p).unwrap();
            let up = t.upscale([25, 24]).unwrap();
            prop_assert_eq!(up.size(), [25, 24]);
            prop_assert_eq!(up.degrees_of_freedom(), (2 * 4 + 3) * (2 * 3 + 3) * 2);
            let error = coincident_error(&t, up.as_ref());
            prop_assert!(error < 1e-9, "worst mismatch {}", error);
        }

        #[test]
        fn test_penalty_gradient_matches_finite_differences(p in values(6 * 6 * 2), kind in 0usize..3) {
            let penalty = [
                SplinePenalty::Membrane,
                SplinePenalty::Bending,
                SplinePenalty::DivCurl { divergence: 0.8, rotation: 0.3 },
            ][kind];
            let config = SplineConfig::default().with_rate(4.0).with_penalty(0.7, penalty);
            let mut t = SplineTransformation::identity([12, 9], &config, ResamplingConfig::default()).unwrap();
            t.set_penalty_scale(0.5);
            t.set_parameters(&p).unwrap();

            let mut g = vec![0.0; p.len()];
            let energy = t.energy_penalty(Some(g.as_mut_slice()));
            prop_assert!(energy >= 0.0);

            let h = 1e-6;
            for i in [0, 3, 29, p.len() / 2, p.len() - 1] {
                let mut q = p.clone();
                q[i] += h;
                t.set_parameters(&q).unwrap();
                let plus = t.energy_penalty(None);
                q[i] -= 2.0 * h;
                t.set_parameters(&q).unwrap();
                let minus = t.energy_penalty(None);
                let numeric = (plus - minus) / (2.0 * h);
                prop_assert!((numeric - g[i]).abs() < 1e-6, "{:?} index {}", penalty, i);
            }
        }
    }

    #[test]
    fn test_upscale_twice_through_odd_sizes() {
        // 50 -> 25 -> 13 as built by the pyramid, upscaled back.
        let config = SplineConfig::default().with_rate(3.0);
        let mut t = SplineTransformation::identity([13, 13], &config, ResamplingConfig::default()).unwrap();
        let p: Vec<f64> = (0..t.degrees_of_freedom())
            .map(|i| ((i % 9) as f64 - 4.0) * 0.1)
            .collect();
        t.set_parameters(&p).unwrap();

        let middle = t.upscale([25, 25]).unwrap();
        assert!(coincident_error(&t, middle.as_ref()) < 1e-9);
        let fine = middle.upscale([50, 50]).unwrap();
        assert!(coincident_error(middle.as_ref(), fine.as_ref()) < 1e-9);
    }

    #[test]
    fn test_penalty_vanishes_on_affine_coefficients() {
        for penalty in [
            SplinePenalty::Bending,
            SplinePenalty::DivCurl { divergence: 1.0, rotation: 2.0 },
        ] {
            let config = SplineConfig::default().with_penalty(1.0, penalty);
            let mut t = SplineTransformation::identity([16, 16], &config, ResamplingConfig::default()).unwrap();
            let grid = *t.coefficients().grid();
            let p: Vec<f64> = (0..grid.len())
                .flat_map(|k| {
                    let [i, j] = grid.index_of(k);
                    [0.5 * i as f64 - j as f64, 2.0 + 0.25 * i as f64]
                })
                .collect();
            t.set_parameters(&p).unwrap();
            assert!(t.energy_penalty(None).abs() < 1e-12, "{penalty:?}");
        }
    }

    #[test]
    fn test_divcurl_separates_divergence_and_rotation() {
        // u = (j^2, i^2): divergence zero, rotation 2i - 2j.
        let rotating = |i: f64, j: f64| [j * j, i * i];
        let penalty = |divergence: f64, rotation: f64| {
            let config = SplineConfig::default()
                .with_rate(4.0)
                .with_penalty(1.0, SplinePenalty::DivCurl { divergence, rotation });
            let mut t = SplineTransformation::identity([16, 16], &config, ResamplingConfig::default()).unwrap();
            let grid = *t.coefficients().grid();
            let p: Vec<f64> = (0..grid.len())
                .flat_map(|k| {
                    let [i, j] = grid.index_of(k);
                    rotating(i as f64, j as f64)
                })
                .collect();
            t.set_parameters(&p).unwrap();
            t.energy_penalty(None)
        };
        assert!(penalty(1.0, 0.0).abs() < 1e-12);
        assert!(penalty(0.0, 1.0) > 0.0);
    }

    #[test]
    fn test_penalty_order() {
        assert_eq!(SplinePenalty::Membrane.order(), 1);
        assert_eq!(SplinePenalty::Bending.order(), 2);
        assert_eq!(SplinePenalty::from_name("DivCurl").map(|p| p.order()), Some(2));
        assert_eq!(SplinePenalty::from_name("thin-plate"), None);
    }

    #[test]
    fn test_apply_constant_shift() {
        let mut t = SplineTransformation::identity([10, 12], &SplineConfig::default(), ResamplingConfig::default())
            .unwrap();
        let p: Vec<f64> = (0..t.degrees_of_freedom())
            .map(|i| if i % 2 == 1 { 1.0 } else { 0.0 })
            .collect();
        t.set_parameters(&p).unwrap();

        let grid = Grid::new([10, 12]).unwrap();
        let ramp = crate::image::ScalarField::from_fn(grid, |[_, x]| x as f64);
        let warped = t.apply(&ramp).unwrap();
        for y in 0..10 {
            for x in 0..11 {
                assert!((warped.at(&[y, x]) - (x as f64 + 1.0)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = SplineConfig::default().with_rate(0.0);
        assert!(SplineTransformation::<2>::identity([8, 8], &config, ResamplingConfig::default()).is_err());
        let config = SplineConfig::default().with_penalty(
            1.0,
            SplinePenalty::DivCurl { divergence: 0.0, rotation: 0.0 },
        );
        assert!(config.validate().is_err());
        let config = SplineConfig::default().with_penalty(
            1.0,
            SplinePenalty::DivCurl { divergence: -1.0, rotation: 1.0 },
        );
        assert!(config.validate().is_err());
    }
}
