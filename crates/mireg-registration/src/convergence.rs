//! Per-level convergence tracking over a window of recent cost values.

use std::collections::VecDeque;

/// Smallest denominator used for relative changes.
const TINY: f64 = 1e-12;

/// Bounded queue of the last `window` cost values.
///
/// Converged iff the queue is full and every successive relative change
/// `|v_k - v_{k-1}| / max(|v_{k-1}|, tiny)` is below the threshold.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    window: usize,
    threshold: f64,
    values: VecDeque<f64>,
    converged: bool,
    transitions: usize,
}

impl ConvergenceTracker {
    /// Create a tracker keeping `window` values (at least 2).
    pub fn new(window: usize, threshold: f64) -> Self {
        let window = window.max(2);
        Self {
            window,
            threshold,
            values: VecDeque::with_capacity(window),
            converged: false,
            transitions: 0,
        }
    }

    /// Record a value; returns whether the tracker now reports convergence.
    pub fn push(&mut self, value: f64) -> bool {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);

        let converged = self.values.len() == self.window
            && self
                .values
                .iter()
                .zip(self.values.iter().skip(1))
                .all(|(prev, next)| (next - prev).abs() / prev.abs().max(TINY) < self.threshold);

        if converged && !self.converged {
            self.transitions += 1;
        }
        self.converged = converged;
        converged
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Number of times the flag went from not converged to converged.
    pub fn transitions(&self) -> usize {
        self.transitions
    }

    /// Values currently held, oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Forget all values (a new level starts).
    pub fn reset(&mut self) {
        self.values.clear();
        self.converged = false;
        self.transitions = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_converged_until_full() {
        let mut tracker = ConvergenceTracker::new(4, 1e-3);
        assert!(!tracker.push(1.0));
        assert!(!tracker.push(1.0));
        assert!(!tracker.push(1.0));
        assert!(tracker.push(1.0));
    }

    #[test]
    fn test_decreasing_then_flat_flips_once() {
        let mut tracker = ConvergenceTracker::new(5, 1e-4);
        let mut flips = 0;
        let mut previous = false;
        let costs = (0..20).map(|k| 100.0 - 4.0 * k as f64).chain(std::iter::repeat(20.0).take(20));
        for cost in costs {
            let now = tracker.push(cost);
            if now && !previous {
                flips += 1;
            }
            previous = now;
        }
        assert_eq!(flips, 1);
        assert_eq!(tracker.transitions(), 1);
        assert!(tracker.is_converged());
    }

    #[test]
    fn test_zero_costs_converge() {
        let mut tracker = ConvergenceTracker::new(3, 1e-6);
        for _ in 0..3 {
            tracker.push(0.0);
        }
        assert!(tracker.is_converged());
    }

    #[test]
    fn test_reset() {
        let mut tracker = ConvergenceTracker::new(2, 0.5);
        tracker.push(1.0);
        tracker.push(1.0);
        assert!(tracker.is_converged());
        tracker.reset();
        assert!(!tracker.is_converged());
        assert_eq!(tracker.values().count(), 0);
    }
}
