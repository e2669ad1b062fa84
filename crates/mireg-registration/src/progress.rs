//! Progress tracking and callbacks for registration workflows.
//!
//! This module provides progress tracking, callbacks, and monitoring
//! capabilities for registration runs. The driver reports every accepted
//! optimizer step and every finished pyramid level.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Progress information for one accepted optimizer step.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Pyramid level (0 is the coarsest).
    pub level: usize,
    /// Current iteration number within the level.
    pub iteration: usize,
    /// Iteration budget of the level (if known).
    pub total_iterations: Option<usize>,
    /// Current cost value.
    pub cost: f64,
    /// Time elapsed since start.
    pub elapsed: Duration,
    /// Estimated remaining time for the level.
    pub estimated_remaining: Option<Duration>,
    /// Additional metrics.
    pub metrics: Vec<(String, f64)>,
}

impl ProgressInfo {
    /// Create new progress information.
    pub fn new(
        level: usize,
        iteration: usize,
        total_iterations: Option<usize>,
        cost: f64,
        elapsed: Duration,
    ) -> Self {
        Self {
            level,
            iteration,
            total_iterations,
            cost,
            elapsed,
            estimated_remaining: None,
            metrics: Vec::new(),
        }
    }

    /// Calculate progress percentage.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_iterations
            .map(|total| (self.iteration as f64 / total.max(1) as f64) * 100.0)
    }

    /// Calculate estimated remaining time.
    pub fn calculate_remaining(&mut self) {
        if let Some(total) = self.total_iterations {
            if self.iteration > 0 {
                let avg_time_per_iter = self.elapsed.as_secs_f64() / self.iteration as f64;
                let remaining_iters = total.saturating_sub(self.iteration);
                self.estimated_remaining =
                    Some(Duration::from_secs_f64(avg_time_per_iter * remaining_iters as f64));
            }
        }
    }

    /// Add a custom metric.
    pub fn add_metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.push((name.into(), value));
    }
}

/// Progress callback trait for monitoring registration progress.
pub trait ProgressCallback: Send + Sync {
    /// Called at each accepted step with progress information.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when registration starts.
    fn on_start(&self) {}

    /// Called when a pyramid level starts.
    fn on_level_start(&self, _level: usize, _size: &[usize]) {}

    /// Called when a pyramid level finished.
    fn on_level_complete(&self, _level: usize, _final_cost: f64) {}

    /// Called when registration completes successfully.
    fn on_complete(&self, _info: &ProgressInfo) {}

    /// Called when registration fails.
    fn on_error(&self, _error: &str) {}
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log interval (iterations).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 50 }
    }
}

impl ConsoleProgressCallback {
    /// Create a new console progress callback.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.iteration % self.log_interval == 0 || info.total_iterations == Some(info.iteration) {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());

            tracing::info!(
                "Level {} | Iter {}/{} ({:.1}%) | Cost: {:.6} | Elapsed: {:.2}s | ETA: {}",
                info.level,
                info.iteration,
                info.total_iterations.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                info.progress_percent().unwrap_or(0.0),
                info.cost,
                info.elapsed.as_secs_f64(),
                remaining
            );

            for (name, value) in &info.metrics {
                tracing::info!("  {}: {:.6}", name, value);
            }
        }
    }

    fn on_start(&self) {
        tracing::info!("Registration started");
    }

    fn on_level_start(&self, level: usize, size: &[usize]) {
        tracing::info!("Level {} started on grid {:?}", level, size);
    }

    fn on_level_complete(&self, level: usize, final_cost: f64) {
        tracing::info!("Level {} finished with cost {:.6}", level, final_cost);
    }

    fn on_complete(&self, info: &ProgressInfo) {
        tracing::info!(
            "Registration completed in {:.2}s with final cost: {:.6}",
            info.elapsed.as_secs_f64(),
            info.cost
        );
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

/// History callback that records all progress information.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
    levels: Arc<Mutex<Vec<(usize, f64)>>>,
}

impl HistoryCallback {
    /// Create a new history callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded step history.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Finished levels with their final cost, in completion order.
    pub fn get_levels(&self) -> Vec<(usize, f64)> {
        self.levels.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Clear the history.
    pub fn clear(&self) {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.levels.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(info.clone());
    }

    fn on_level_complete(&self, level: usize, final_cost: f64) {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, final_cost));
    }
}

/// Progress tracker that manages multiple callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Arc<Mutex<Option<Instant>>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    /// Builder-style [`ProgressTracker::add_callback`].
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    fn elapsed(&self) -> Duration {
        let start_time = *self.start_time.lock().unwrap_or_else(PoisonError::into_inner);
        start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Start tracking.
    pub fn start(&self) {
        *self.start_time.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start();
        }
    }

    /// A pyramid level starts.
    pub fn level_start(&self, level: usize, size: &[usize]) {
        for callback in &self.callbacks {
            callback.on_level_start(level, size);
        }
    }

    /// Report an accepted step.
    pub fn update(&self, level: usize, iteration: usize, total_iterations: Option<usize>, cost: f64) {
        let mut info = ProgressInfo::new(level, iteration, total_iterations, cost, self.elapsed());
        info.calculate_remaining();

        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    /// A pyramid level finished.
    pub fn level_complete(&self, level: usize, final_cost: f64) {
        for callback in &self.callbacks {
            callback.on_level_complete(level, final_cost);
        }
    }

    /// Complete tracking.
    pub fn complete(&self, level: usize, final_cost: f64) {
        let info = ProgressInfo::new(level, 0, None, final_cost, self.elapsed());
        for callback in &self.callbacks {
            callback.on_complete(&info);
        }
    }

    /// Report error.
    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }
}
