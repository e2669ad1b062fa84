//! Navier operator solved by successive over-relaxation.
//!
//! Solves `mu * lap(v) + (lambda + mu) * grad(div v) = -f` on the interior of
//! the grid with a zero border. The cross-derivative couples diagonal
//! neighbours, so points are split into `2^D` parity classes (the
//! generalization of red-black ordering): no point shares a class with any
//! of its stencil neighbours. Each class is updated in parallel from a
//! read-only buffer into a second buffer, and the buffers are swapped before
//! the next class.

use mireg_core::{Grid, VectorField};
use rayon::prelude::*;
use crate::config::{RegularizerModel, SorConfig};
use crate::error::{RegistrationError, Result};
use crate::validation::validate_sor;
use super::{SorReport, SorStatus, VectorFieldRegularizer};

/// Stencil weights derived from the Lamé coefficients.
#[derive(Debug, Clone, Copy)]
struct Stencil {
    /// `1 / (2 D mu + 2 (lambda + mu))`
    c: f64,
    /// Weight of the two neighbours along the component's own axis.
    along: f64,
    /// Weight of the neighbours along the other axes.
    across: f64,
    /// Weight of the mixed second derivative.
    mixed: f64,
}

impl Stencil {
    fn new(config: &SorConfig, dim: usize) -> Self {
        let a = config.mu;
        let b = config.lambda + config.mu;
        let c = 1.0 / (2.0 * dim as f64 * a + 2.0 * b);
        Self {
            c,
            along: (a + b) * c,
            across: a * c,
            mixed: 0.25 * b * c,
        }
    }
}

/// Navier (fluid or elastic) regularizer.
#[derive(Debug, Clone)]
pub struct NavierSor<const D: usize> {
    config: SorConfig,
    stencil: Stencil,
    solution: Option<VectorField<D>>,
}

impl<const D: usize> NavierSor<D> {
    pub fn new(config: SorConfig) -> Result<Self> {
        validate_sor(&config)?;
        Ok(Self {
            stencil: Stencil::new(&config, D),
            config,
            solution: None,
        })
    }

    pub fn config(&self) -> &SorConfig {
        &self.config
    }

    /// Updates every interior point of one parity class; returns the largest change.
    fn relax_class(
        &self,
        grid: &Grid<D>,
        class: usize,
        force: &[[f64; D]],
        src: &[[f64; D]],
        dst: &mut [[f64; D]],
    ) -> f64 {
        let strides = grid.strides();
        let row = grid.row_len();
        let omega = self.config.omega;
        let st = self.stencil;

        dst.par_chunks_mut(row)
            .enumerate()
            .map(|(r, out)| {
                let start = r * row;
                let first = grid.index_of(start);
                let mut largest = 0.0f64;
                for (offset, o) in out.iter_mut().enumerate() {
                    let l = start + offset;
                    let mut index = first;
                    index[D - 1] += offset;
                    let in_class = (0..D).fold(0, |acc, a| acc | ((index[a] & 1) << a)) == class;
                    if !in_class || !grid.is_interior(&index) {
                        *o = src[l];
                        continue;
                    }

                    let current = src[l];
                    let mut next = current;
                    for i in 0..D {
                        let si = strides[i];
                        let mut r_i = st.c * force[l][i]
                            + st.along * (src[l + si][i] + src[l - si][i]);
                        for j in (0..D).filter(|&j| j != i) {
                            let sj = strides[j];
                            r_i += st.across * (src[l + sj][i] + src[l - sj][i]);
                            r_i += st.mixed
                                * (src[l + si + sj][j] + src[l - si - sj][j]
                                    - src[l + si - sj][j]
                                    - src[l - si + sj][j]);
                        }
                        let delta = omega * (r_i - current[i]);
                        next[i] = current[i] + delta;
                        largest = largest.max(delta.abs());
                    }
                    *o = next;
                }
                largest
            })
            .reduce(|| 0.0, f64::max)
    }
}

impl<const D: usize> VectorFieldRegularizer<D> for NavierSor<D> {
    fn name(&self) -> &str {
        match self.config.model {
            RegularizerModel::Fluid => "fluid",
            RegularizerModel::Elastic => "elastic",
        }
    }

    fn run(&mut self, force: &VectorField<D>) -> Result<SorReport> {
        let grid = *force.grid();
        let mut current = match (self.config.model, self.solution.take()) {
            (RegularizerModel::Elastic, Some(previous)) if previous.grid() == &grid => previous,
            _ => VectorField::zeros(grid),
        };
        let mut scratch = current.clone();

        let mut previous_residual = f64::INFINITY;
        let mut increases = 0;
        let mut residual = 0.0;
        let mut status = SorStatus::IterationLimit;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;
            residual = 0.0f64;
            for class in 0..(1usize << D) {
                let changed = self.relax_class(
                    &grid,
                    class,
                    force.values(),
                    current.values(),
                    scratch.values_mut(),
                );
                residual = residual.max(changed);
                std::mem::swap(&mut current, &mut scratch);
            }

            if !residual.is_finite() {
                return Err(RegistrationError::non_convergence(format!(
                    "SOR residual became {residual} after {iterations} sweeps"
                )));
            }
            if residual < self.config.epsilon {
                status = SorStatus::Converged;
                break;
            }
            if residual > previous_residual {
                increases += 1;
                if increases >= self.config.divergence_window {
                    return Err(RegistrationError::non_convergence(format!(
                        "SOR residual increased for {increases} consecutive sweeps (now {residual:.3e})"
                    )));
                }
            } else {
                increases = 0;
            }
            previous_residual = residual;
        }

        tracing::debug!(iterations, residual, ?status, "navier sor finished");
        self.solution = Some(current);
        Ok(SorReport {
            status,
            iterations,
            residual,
        })
    }

    fn solution(&self) -> Option<&VectorField<D>> {
        self.solution.as_ref()
    }

    fn reset(&mut self) {
        self.solution = None;
    }

    fn clone_box(&self) -> Box<dyn VectorFieldRegularizer<D>> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse<const D: usize>(size: [usize; D]) -> VectorField<D> {
        let grid = Grid::new(size).unwrap();
        let mut force = VectorField::zeros(grid);
        let center: [usize; D] = std::array::from_fn(|a| size[a] / 2);
        force.values_mut()[grid.linear_index(&center)][0] = 1.0;
        force
    }

    #[test]
    fn test_zero_force_is_fixed_point() {
        let mut sor = NavierSor::<2>::new(SorConfig::default()).unwrap();
        let force = VectorField::zeros(Grid::new([16, 16]).unwrap());
        let report = sor.run(&force).unwrap();
        assert_eq!(report.status, SorStatus::Converged);
        assert_eq!(report.iterations, 1);
        assert_eq!(sor.solution().unwrap().max_abs(), 0.0);
    }

    #[test]
    fn test_impulse_converges_monotonically() {
        for omega in [1.0, 1.2, 1.5] {
            let config = SorConfig::default().with_omega(omega).with_epsilon(1e-4).with_max_iterations(500);
            let mut sor = NavierSor::<2>::new(config).unwrap();
            let mut residuals = Vec::new();
            let force = impulse([16, 16]);
            // rerun with growing budgets to observe the residual sequence
            for budget in 1..=8 {
                let mut sor = NavierSor::<2>::new(config.with_max_iterations(budget)).unwrap();
                residuals.push(sor.run(&force).unwrap().residual);
            }
            assert!(residuals.windows(2).all(|w| w[1] <= w[0]), "omega {omega}: {residuals:?}");

            let report = sor.run(&force).unwrap();
            assert_eq!(report.status, SorStatus::Converged, "omega {omega}");
            assert!(report.iterations < 500);

            let solution = sor.solution().unwrap();
            // pushing along axis 0 moves the center along axis 0
            assert!(solution.at(&[8, 8])[0] > 0.0);
            assert_eq!(solution.at(&[0, 8]), [0.0, 0.0]);
        }
    }

    #[test]
    fn test_impulse_3d() {
        let config = SorConfig::default().with_epsilon(1e-5).with_max_iterations(300);
        let mut sor = NavierSor::<3>::new(config).unwrap();
        let report = sor.run(&impulse([8, 8, 8])).unwrap();
        assert_eq!(report.status, SorStatus::Converged);
        let solution = sor.solution().unwrap();
        assert!(solution.at(&[4, 4, 4])[0] > 0.0);
        // symmetric in the two transverse axes
        let a = solution.at(&[4, 3, 4])[0];
        let b = solution.at(&[4, 4, 3])[0];
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_elastic_warm_starts() {
        let config = SorConfig::default()
            .with_model(RegularizerModel::Elastic)
            .with_epsilon(1e-6)
            .with_max_iterations(1000);
        let mut sor = NavierSor::<2>::new(config).unwrap();
        let force = impulse([12, 12]);
        let first = sor.run(&force).unwrap();
        let second = sor.run(&force).unwrap();
        assert_eq!(sor.name(), "elastic");
        assert!(second.iterations < first.iterations);

        sor.reset();
        assert!(sor.solution().is_none());
    }

    #[test]
    fn test_budget_exhaustion_is_reported() {
        let config = SorConfig::default().with_epsilon(1e-12).with_max_iterations(3);
        let mut sor = NavierSor::<2>::new(config).unwrap();
        let report = sor.run(&impulse([16, 16])).unwrap();
        assert_eq!(report.status, SorStatus::IterationLimit);
        assert_eq!(report.iterations, 3);
    }

    #[test]
    fn test_non_finite_force_is_non_convergence() {
        let mut sor = NavierSor::<2>::new(SorConfig::default()).unwrap();
        let mut force = impulse([16, 16]);
        force.values_mut()[5 * 16 + 7][1] = f64::INFINITY;
        let result = sor.run(&force);
        assert!(matches!(result, Err(RegistrationError::NonConvergence(_))), "{result:?}");
        assert!(sor.solution().is_none());
    }

    #[test]
    fn test_rising_residual_is_non_convergence() {
        // Nearly incompressible and strongly over-relaxed: the residual of the
        // impulse response grows on sweeps 2 and 3 before it settles.
        let config = SorConfig::default()
            .with_lame(0.001, 1000.0)
            .with_omega(1.9)
            .with_epsilon(1e-12)
            .with_max_iterations(20);

        let mut sor = NavierSor::<2>::new(config.with_divergence_window(2)).unwrap();
        match sor.run(&impulse([16, 16])) {
            Err(RegistrationError::NonConvergence(message)) => assert!(message.contains("2 consecutive")),
            other => panic!("expected non-convergence, got {other:?}"),
        }
        assert!(sor.solution().is_none());

        let mut sor = NavierSor::<2>::new(config.with_divergence_window(3)).unwrap();
        let report = sor.run(&impulse([16, 16])).unwrap();
        assert_eq!(report.status, SorStatus::IterationLimit);
        assert_eq!(report.iterations, 20);
    }

    #[test]
    fn test_invalid_omega() {
        let result = NavierSor::<2>::new(SorConfig::default().with_omega(2.5));
        assert!(matches!(result, Err(RegistrationError::Configuration(_))));
    }
}
