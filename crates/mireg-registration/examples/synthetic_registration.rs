//! Synthetic registration demo.
//!
//! Builds a pair of 2D images that differ by a smooth warp, registers them
//! once with a spline transformation and once with a fluid-regularized dense
//! field, and logs the per-level reports.
//!
//! Usage:
//!   RUST_LOG=info cargo run --example synthetic_registration

use std::sync::Arc;
use anyhow::Context;
use burn_ndarray::NdArray;
use mireg_core::{Image, Point, Spacing};
use mireg_registration::{
    ConsoleProgressCallback, LevelConfig, PluginRegistry, ProgressTracker, PyramidConfig,
    RegistrationConfig, RegistrationDriver, RegistrationOutcome,
};
use tracing_subscriber::EnvFilter;

type Backend = NdArray<f32>;
const SIZE: usize = 96;

fn blobs(shift: impl Fn(f64, f64) -> (f64, f64)) -> Vec<f64> {
    let mut values = Vec::with_capacity(SIZE * SIZE);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let (dy, dx) = shift(y as f64, x as f64);
            let (y, x) = (y as f64 - dy, x as f64 - dx);
            let a = (-((x - 45.0).powi(2) + (y - 48.0).powi(2)) / (2.0 * 12.0 * 12.0)).exp();
            let b = 0.6 * (-((x - 62.0).powi(2) + (y - 36.0).powi(2)) / (2.0 * 7.0 * 7.0)).exp();
            values.push(a + b);
        }
    }
    values
}

fn report(label: &str, outcome: &RegistrationOutcome<2>) {
    tracing::info!("{label}: final cost {:.6}", outcome.final_cost);
    for level in &outcome.levels {
        tracing::info!(
            "  level {} {:?}: {:?} after {} steps, cost {:.6} -> {:.6}{}",
            level.level,
            level.size,
            level.status,
            level.iterations,
            level.initial_cost,
            level.final_cost,
            if level.iteration_limited { " (iteration limited)" } else { "" }
        );
    }
    let field = outcome.transformation.displacement_field();
    let center = field.at(&[SIZE / 2, SIZE / 2]);
    tracing::info!("  displacement at the center: {:?}", center);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let device = Default::default();
    let reference = Image::<Backend, 2>::from_host(
        &blobs(|_, _| (0.0, 0.0)),
        [SIZE, SIZE],
        Point::origin(),
        Spacing::uniform(1.0),
        &device,
    );
    // floating(x) = reference(x - s(x)), so the expected displacement is s
    let floating = Image::<Backend, 2>::from_host(
        &blobs(|y, x| {
            let bump = (-((x - 48.0).powi(2) + (y - 48.0).powi(2)) / (2.0 * 30.0 * 30.0)).exp();
            (1.5 * bump, 3.0 * bump)
        }),
        [SIZE, SIZE],
        Point::origin(),
        Spacing::uniform(1.0),
        &device,
    );

    let registry = PluginRegistry::<2>::with_defaults();
    let config = RegistrationConfig::default()
        .with_pyramid(PyramidConfig::default().with_levels(3).with_min_level_size(16))
        .with_level(LevelConfig::default().with_max_iterations(150).with_convergence(5, 1e-6));
    let progress = ProgressTracker::new().with_callback(Arc::new(ConsoleProgressCallback::new(25)));

    let spline = RegistrationDriver::new(
        config,
        registry.create_transformation("spline:rate=8,penalty=0.01,energy=bending")?,
        registry.create_minimizer("gdas:minstep=0.01,maxstep=1.0,maxiter=300")?,
    )
    .with_cost(registry.create_cost("ssd")?)
    .with_refinement(registry.create_minimizer("lbfgs:maxiter=50")?)
    .with_progress(progress.clone());
    let outcome = spline.run(&floating, &reference).context("spline registration failed")?;
    report("spline + gdas/lbfgs", &outcome);

    let fluid = RegistrationDriver::new(
        config,
        registry.create_transformation("vf:boundary=clamp")?,
        registry.create_minimizer("gdas:minstep=0.01,maxstep=0.5,maxiter=300")?,
    )
    .with_cost(registry.create_cost("ssd")?)
    .with_regularizer(registry.create_regularizer("fluid:mu=1,lambda=1,omega=1.5,epsilon=1e-4")?)
    .with_progress(progress);
    let outcome = fluid.run(&floating, &reference).context("fluid registration failed")?;
    report("dense field + fluid", &outcome);

    let warped = outcome.warp(&floating)?;
    let before = difference(&floating, &reference)?;
    let after = difference(&warped, &reference)?;
    tracing::info!("mean squared difference: {before:.6} before, {after:.6} after");
    Ok(())
}

fn difference(a: &Image<Backend, 2>, b: &Image<Backend, 2>) -> anyhow::Result<f64> {
    let a = a.to_host()?;
    let b = b.to_host()?;
    Ok(a.iter().zip(&b).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64)
}
