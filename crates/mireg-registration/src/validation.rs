//! Validation utilities for registration configuration.
//!
//! Every check returns [`RegistrationError::Configuration`], so a bad setup
//! is rejected before the first iteration.

use crate::config::{GdasConfig, LbfgsConfig, LevelConfig, PyramidConfig, RegistrationConfig, SorConfig};
use crate::error::{RegistrationError, Result};

/// Validate iteration count.
pub fn validate_iterations(what: &str, iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(RegistrationError::configuration(format!(
            "{what}: iterations must be positive"
        )));
    }

    if iterations > 1_000_000 {
        return Err(RegistrationError::configuration(format!(
            "{what}: iterations too large: {iterations}"
        )));
    }

    Ok(())
}

/// Validate a strictly positive, finite value.
pub fn validate_positive(what: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(RegistrationError::configuration(format!(
            "{what} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}

/// Validate a non-negative, finite value.
pub fn validate_non_negative(what: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(RegistrationError::configuration(format!(
            "{what} must be non-negative and finite, got {value}"
        )));
    }
    Ok(())
}

/// Validate pyramid settings.
pub fn validate_pyramid(config: &PyramidConfig) -> Result<()> {
    if config.levels == 0 {
        return Err(RegistrationError::configuration("pyramid needs at least one level"));
    }
    if config.levels > 16 {
        return Err(RegistrationError::configuration(format!(
            "too many pyramid levels: {}",
            config.levels
        )));
    }
    if config.min_level_size == 0 {
        return Err(RegistrationError::configuration("minimum level size must be positive"));
    }
    validate_non_negative("smoothing sigma", config.smoothing_sigma)
}

/// Validate the per-level budget and convergence test.
pub fn validate_level(config: &LevelConfig) -> Result<()> {
    validate_iterations("level", config.max_iterations)?;
    if config.convergence_window < 2 {
        return Err(RegistrationError::configuration(format!(
            "convergence window must hold at least 2 values, got {}",
            config.convergence_window
        )));
    }
    validate_non_negative("convergence threshold", config.convergence_threshold)
}

/// Validate Navier SOR settings.
pub fn validate_sor(config: &SorConfig) -> Result<()> {
    validate_positive("mu", config.mu)?;
    if !config.lambda.is_finite() || config.lambda + config.mu <= 0.0 {
        return Err(RegistrationError::configuration(format!(
            "lambda + mu must be positive, got lambda={} mu={}",
            config.lambda, config.mu
        )));
    }
    if !(config.omega > 0.0 && config.omega < 2.0) {
        return Err(RegistrationError::configuration(format!(
            "omega must lie in (0, 2), got {}",
            config.omega
        )));
    }
    validate_positive("epsilon", config.epsilon)?;
    validate_iterations("sor", config.max_iterations)?;
    if config.divergence_window == 0 {
        return Err(RegistrationError::configuration("divergence window must be positive"));
    }
    Ok(())
}

/// Validate gradient descent settings.
pub fn validate_gdas(config: &GdasConfig) -> Result<()> {
    validate_positive("min_step", config.min_step)?;
    validate_positive("max_step", config.max_step)?;
    if config.max_step <= config.min_step {
        return Err(RegistrationError::configuration(format!(
            "max_step ({}) must be larger than min_step ({})",
            config.max_step, config.min_step
        )));
    }
    validate_non_negative("xtol", config.xtol)?;
    validate_non_negative("ftolr", config.ftolr)?;
    validate_iterations("gdas", config.max_iterations)?;
    if config.max_tries == 0 {
        return Err(RegistrationError::configuration("max_tries must be positive"));
    }
    Ok(())
}

/// Validate L-BFGS history size.
pub fn validate_lbfgs_history_size(history_size: usize) -> Result<()> {
    if history_size < 1 {
        return Err(RegistrationError::configuration(
            "L-BFGS history size must be at least 1",
        ));
    }

    if history_size > 100 {
        return Err(RegistrationError::configuration(format!(
            "L-BFGS history size too large: {history_size}"
        )));
    }

    Ok(())
}

/// Validate L-BFGS settings.
pub fn validate_lbfgs(config: &LbfgsConfig) -> Result<()> {
    validate_lbfgs_history_size(config.history_size)?;
    validate_non_negative("gtol", config.gtol)?;
    validate_non_negative("ftolr", config.ftolr)?;
    validate_iterations("lbfgs", config.max_iterations)?;
    if config.max_halvings == 0 {
        return Err(RegistrationError::configuration("max_halvings must be positive"));
    }
    Ok(())
}

/// Validate a whole run.
pub fn validate_registration(config: &RegistrationConfig) -> Result<()> {
    validate_pyramid(&config.pyramid)?;
    validate_level(&config.level)
}

/// Ensure floating and reference images share a grid.
pub fn validate_image_sizes<const D: usize>(floating: [usize; D], reference: [usize; D]) -> Result<()> {
    if floating != reference {
        return Err(RegistrationError::configuration(format!(
            "floating image size {floating:?} differs from reference size {reference:?}"
        )));
    }
    Ok(())
}
