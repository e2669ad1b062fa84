//! Separable interpolation kernels.
//!
//! Kernels are evaluated one axis at a time; [`for_each_tap`] walks the
//! tensor product of the per-axis taps.

/// Cubic B-spline basis weights for the four taps `floor(t) - 1 ..= floor(t) + 2`,
/// where `u = t - floor(t)`.
///
/// The weights sum to one for every `u` in `[0, 1)`.
pub fn cubic_bspline_weights(u: f64) -> [f64; 4] {
    let u2 = u * u;
    let u3 = u2 * u;
    let v = 1.0 - u;
    [
        v * v * v / 6.0,
        (3.0 * u3 - 6.0 * u2 + 4.0) / 6.0,
        (-3.0 * u3 + 3.0 * u2 + 3.0 * u + 1.0) / 6.0,
        u3 / 6.0,
    ]
}

/// Visit every combination of per-axis taps, last axis fastest.
///
/// `visit` receives the combined index and the product of the per-axis weights.
/// Nothing is visited if any axis has no taps.
pub fn for_each_tap<const D: usize, I: Copy>(
    taps: &[&[(I, f64)]; D],
    mut visit: impl FnMut(&[I; D], f64),
) {
    if taps.iter().any(|t| t.is_empty()) {
        return;
    }
    let mut counter = [0usize; D];
    loop {
        let index: [I; D] = std::array::from_fn(|a| taps[a][counter[a]].0);
        let weight: f64 = (0..D).map(|a| taps[a][counter[a]].1).product();
        visit(&index, weight);

        let mut axis = D;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            counter[axis] += 1;
            if counter[axis] < taps[axis].len() {
                break;
            }
            counter[axis] = 0;
        }
    }
}

/// Up to four taps along one axis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AxisTaps {
    taps: [(Option<usize>, f64); 4],
    len: usize,
}

impl AxisTaps {
    pub(crate) fn new() -> Self {
        Self { taps: [(None, 0.0); 4], len: 0 }
    }

    pub(crate) fn push(&mut self, index: Option<usize>, weight: f64) {
        self.taps[self.len] = (index, weight);
        self.len += 1;
    }

    pub(crate) fn as_slice(&self) -> &[(Option<usize>, f64)] {
        &self.taps[..self.len]
    }
}
