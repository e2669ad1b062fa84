//! Gradient descent with adaptive step.
//!
//! Every move has the length `step` in the max-norm: `x -= step / |g|_inf * g`.
//! A large gain grows the step, a failed move halves it down to `min_step`;
//! below that a bounded number of probing halvings is tried before the line
//! search is declared failed.

use crate::config::GdasConfig;
use crate::error::Result;
use crate::validation::validate_gdas;
use super::trait_::{
    check_size, ensure_finite, max_abs, Minimizer, MinimizerReport, MinimizerStatus, Problem,
    StepControl, StepMonitor,
};

/// Gradient descent with adaptive step size.
#[derive(Debug, Clone, Default)]
pub struct Gdas {
    config: GdasConfig,
}

impl Gdas {
    pub fn new(config: GdasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GdasConfig {
        &self.config
    }
}

impl Minimizer for Gdas {
    fn name(&self) -> &str {
        "gdas"
    }

    fn minimize(
        &self,
        problem: &mut dyn Problem,
        x: &mut [f64],
        monitor: &mut dyn StepMonitor,
    ) -> Result<MinimizerReport> {
        validate_gdas(&self.config)?;
        check_size(problem, x)?;
        let config = &self.config;

        let n = x.len();
        let mut gradient = vec![0.0; n];
        let mut trial = vec![0.0; n];
        let mut trial_gradient = vec![0.0; n];

        let mut value = ensure_finite(problem.value_and_gradient(x, &mut gradient)?, "gdas")?;
        let initial_value = value;
        let mut evaluations = 1;
        let mut iterations = 0;
        let mut step = (0.5 * (config.max_step - config.min_step)).clamp(config.min_step, config.max_step);
        let mut tries = 0usize;

        let status = loop {
            let gmax = max_abs(&gradient);
            if gmax == 0.0 || gmax < config.xtol {
                break MinimizerStatus::Converged;
            }
            if iterations >= config.max_iterations {
                break MinimizerStatus::IterationLimit;
            }
            iterations += 1;

            let trial_step = step * 0.5f64.powi(tries as i32);
            let scale = trial_step / gmax;
            for ((t, xi), gi) in trial.iter_mut().zip(x.iter()).zip(&gradient) {
                *t = xi - scale * gi;
            }
            let trial_value =
                ensure_finite(problem.value_and_gradient(&trial, &mut trial_gradient)?, "gdas")?;
            evaluations += 1;

            if trial_value < value {
                let relative_gain = (value - trial_value) / value.abs().max(f64::MIN_POSITIVE);
                if trial_value < 0.5 * value {
                    step = (step * 1.5).min(config.max_step);
                }
                x.copy_from_slice(&trial);
                std::mem::swap(&mut gradient, &mut trial_gradient);
                value = trial_value;
                tries = 0;
                tracing::debug!(iteration = iterations, value, step = trial_step, "gdas step accepted");

                match monitor.on_step(iterations, value) {
                    StepControl::Continue => {}
                    StepControl::Stop => break MinimizerStatus::Converged,
                    StepControl::Interrupt => break MinimizerStatus::Interrupted,
                }
                if relative_gain < config.ftolr {
                    break MinimizerStatus::Converged;
                }
            } else if step > config.min_step && tries == 0 {
                step = (0.5 * step).max(config.min_step);
            } else {
                tries += 1;
                if tries >= config.max_tries {
                    break MinimizerStatus::LineSearchFailed;
                }
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
        let mut config = self.config;
        config.min_step *= step_scale;
        config.max_step *= step_scale;
        Box::new(Gdas::new(config))
    }
}
