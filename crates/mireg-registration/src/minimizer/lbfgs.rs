//! Limited-memory BFGS on a host parameter vector.
//!
//! Standard two-loop recursion with the `s'y / y'y` scaling of the initial
//! Hessian, followed by a backtracking Armijo line search.

use std::collections::VecDeque;

use crate::config::LbfgsConfig;
use crate::error::Result;
use crate::validation::{validate_lbfgs, validate_positive};
use super::trait_::{
    check_size, dot, ensure_finite, max_abs, Minimizer, MinimizerReport, MinimizerStatus, Problem,
    StepControl, StepMonitor,
};

/// Sufficient decrease constant of the Armijo condition.
const ARMIJO: f64 = 1e-4;

/// Curvature pairs with `y's` below this are not stored.
const MIN_CURVATURE: f64 = 1e-10;

#[derive(Debug, Clone)]
struct Correction {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

/// L-BFGS minimizer.
#[derive(Debug, Clone)]
pub struct Lbfgs {
    config: LbfgsConfig,
    /// Max-norm of the first (steepest descent) move.
    initial_step: f64,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self::new(LbfgsConfig::default())
    }
}

impl Lbfgs {
    pub fn new(config: LbfgsConfig) -> Self {
        Self {
            config,
            initial_step: 1.0,
        }
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    pub fn config(&self) -> &LbfgsConfig {
        &self.config
    }

    /// `direction = -H g`
    fn two_loop(history: &VecDeque<Correction>, gradient: &[f64], direction: &mut [f64]) {
        direction.copy_from_slice(gradient);
        let mut alphas = Vec::with_capacity(history.len());

        for c in history.iter().rev() {
            let alpha = c.rho * dot(&c.s, direction);
            for (d, y) in direction.iter_mut().zip(&c.y) {
                *d -= alpha * y;
            }
            alphas.push(alpha);
        }

        if let Some(last) = history.back() {
            let gamma = dot(&last.s, &last.y) / dot(&last.y, &last.y);
            direction.iter_mut().for_each(|d| *d *= gamma);
        }

        for (c, alpha) in history.iter().zip(alphas.iter().rev()) {
            let beta = c.rho * dot(&c.y, direction);
            for (d, s) in direction.iter_mut().zip(&c.s) {
                *d += (alpha - beta) * s;
            }
        }

        direction.iter_mut().for_each(|d| *d = -*d);
    }
}

impl Minimizer for Lbfgs {
    fn name(&self) -> &str {
        "lbfgs"
    }

    fn minimize(
        &self,
        problem: &mut dyn Problem,
        x: &mut [f64],
        monitor: &mut dyn StepMonitor,
    ) -> Result<MinimizerReport> {
        validate_lbfgs(&self.config)?;
        validate_positive("initial step", self.initial_step)?;
        check_size(problem, x)?;
        let config = &self.config;

        let n = x.len();
        let mut gradient = vec![0.0; n];
        let mut direction = vec![0.0; n];
        let mut trial = vec![0.0; n];
        let mut trial_gradient = vec![0.0; n];
        let mut history: VecDeque<Correction> = VecDeque::with_capacity(config.history_size);

        let mut value = ensure_finite(problem.value_and_gradient(x, &mut gradient)?, "lbfgs")?;
        let initial_value = value;
        let mut evaluations = 1;
        let mut iterations = 0;

        let status = 'outer: loop {
            let gmax = max_abs(&gradient);
            if gmax == 0.0 || gmax <= config.gtol {
                break MinimizerStatus::Converged;
            }
            if iterations >= config.max_iterations {
                break MinimizerStatus::IterationLimit;
            }
            iterations += 1;

            Self::two_loop(&history, &gradient, &mut direction);
            let mut slope = dot(&direction, &gradient);
            if slope.is_nan() || slope >= 0.0 {
                tracing::debug!(iteration = iterations, "lbfgs direction is not a descent direction, resetting");
                history.clear();
                for (d, g) in direction.iter_mut().zip(&gradient) {
                    *d = -g;
                }
                slope = -dot(&gradient, &gradient);
            }

            let mut alpha = if history.is_empty() {
                self.initial_step / max_abs(&direction)
            } else {
                1.0
            };

            let mut halvings = 0;
            let trial_value = loop {
                for ((t, xi), di) in trial.iter_mut().zip(x.iter()).zip(&direction) {
                    *t = xi + alpha * di;
                }
                let candidate = ensure_finite(
                    problem.value_and_gradient(&trial, &mut trial_gradient)?,
                    "lbfgs",
                )?;
                evaluations += 1;
                if candidate <= value + ARMIJO * alpha * slope && candidate <= value {
                    break candidate;
                }
                halvings += 1;
                if halvings > config.max_halvings {
                    break 'outer MinimizerStatus::LineSearchFailed;
                }
                alpha *= 0.5;
            };

            let s: Vec<f64> = trial.iter().zip(x.iter()).map(|(t, xi)| t - xi).collect();
            let y: Vec<f64> = trial_gradient.iter().zip(&gradient).map(|(a, b)| a - b).collect();
            let ys = dot(&y, &s);
            if ys > MIN_CURVATURE {
                if history.len() == config.history_size {
                    history.pop_front();
                }
                history.push_back(Correction { s, y, rho: 1.0 / ys });
            }

            let relative_gain = (value - trial_value) / value.abs().max(f64::MIN_POSITIVE);
            x.copy_from_slice(&trial);
            std::mem::swap(&mut gradient, &mut trial_gradient);
            value = trial_value;
            tracing::debug!(iteration = iterations, value, alpha, "lbfgs step accepted");

            match monitor.on_step(iterations, value) {
                StepControl::Continue => {}
                StepControl::Stop => break MinimizerStatus::Converged,
                StepControl::Interrupt => break MinimizerStatus::Interrupted,
            }
            if relative_gain < config.ftolr {
                break MinimizerStatus::Converged;
            }
        };

        Ok(MinimizerReport {
            status,
            iterations,
            evaluations,
            initial_value,
            final_value: value,
        })
    }

    fn scaled(&self, step_scale: f64) -> Box<dyn Minimizer> {
        Box::new(self.clone().with_initial_step(self.initial_step * step_scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistrationError;
    use crate::minimizer::trait_::testing::{Plateau, Quadratic, Recorder};
    use crate::minimizer::Unmonitored;

    /// Rosenbrock valley in two dimensions.
    struct Rosenbrock;

    impl Problem for Rosenbrock {
        fn size(&self) -> usize {
            2
        }

        fn value(&mut self, x: &[f64]) -> Result<f64> {
            Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
        }

        fn value_and_gradient(&mut self, x: &[f64], gradient: &mut [f64]) -> Result<f64> {
            gradient[0] = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]);
            gradient[1] = 200.0 * (x[1] - x[0] * x[0]);
            self.value(x)
        }
    }

    #[test]
    fn test_quadratic_minimum() {
        let mut problem = Quadratic {
            weights: vec![1.0, 10.0, 0.1, 4.0],
            center: vec![1.0, -2.0, 3.0, 0.5],
        };
        let mut x = vec![0.0; 4];
        let mut recorder = Recorder::default();
        let report = Lbfgs::default().minimize(&mut problem, &mut x, &mut recorder).unwrap();

        assert_eq!(report.status, MinimizerStatus::Converged, "{report:?}");
        assert!(report.final_value < 1e-10);
        for (xi, ci) in x.iter().zip(&problem.center) {
            assert!((xi - ci).abs() < 1e-4);
        }
        assert!(recorder.values.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_rosenbrock() {
        let mut x = vec![-1.2, 1.0];
        let config = LbfgsConfig::default().with_tolerances(1e-8, 0.0).with_max_iterations(500);
        let report = Lbfgs::new(config).minimize(&mut Rosenbrock, &mut x, &mut Unmonitored).unwrap();
        assert!(report.final_value < 1e-6, "{report:?}");
        assert!((x[0] - 1.0).abs() < 1e-2 && (x[1] - 1.0).abs() < 2e-2);
    }

    #[test]
    fn test_plateau_fails_line_search() {
        let mut x = vec![0.0, 0.0];
        let report = Lbfgs::default().minimize(&mut Plateau, &mut x, &mut Unmonitored).unwrap();
        assert_eq!(report.status, MinimizerStatus::LineSearchFailed);
        assert_eq!(x, vec![0.0, 0.0]);
        assert_eq!(report.evaluations, 1 + 1 + LbfgsConfig::default().max_halvings);
    }

    #[test]
    fn test_size_mismatch() {
        let mut problem = Quadratic {
            weights: vec![1.0; 3],
            center: vec![0.0; 3],
        };
        let result = Lbfgs::default().minimize(&mut problem, &mut [1.0, 2.0], &mut Unmonitored);
        assert!(matches!(result, Err(RegistrationError::Configuration(_))));
    }

    #[test]
    fn test_zero_history_is_configuration_error() {
        let lbfgs = Lbfgs::new(LbfgsConfig::default().with_history_size(0));
        let mut problem = Quadratic {
            weights: vec![1.0],
            center: vec![1.0],
        };
        let result = lbfgs.minimize(&mut problem, &mut [0.0], &mut Unmonitored);
        assert!(matches!(result, Err(RegistrationError::Configuration(_))));
    }
}
