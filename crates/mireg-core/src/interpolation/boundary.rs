//! Boundary extension policies for out-of-domain samples.

use serde::{Deserialize, Serialize};

/// How a sample index outside `[0, n)` is mapped back into the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundaryMode {
    /// Reflect about the edge samples without repeating them (period `2n - 2`).
    #[default]
    Mirror,
    /// Every out-of-domain tap reads the configured fill value.
    Constant,
    /// Repeat the edge sample.
    Clamp,
    /// Wrap around (period `n`).
    Periodic,
}

impl BoundaryMode {
    /// Map `index` onto an axis of length `n`.
    ///
    /// Returns `None` only for [`BoundaryMode::Constant`] when the index lies
    /// outside the axis; the caller substitutes its fill value.
    pub fn map_index(self, index: isize, n: usize) -> Option<usize> {
        let len = n as isize;
        if (0..len).contains(&index) {
            return Some(index as usize);
        }
        match self {
            BoundaryMode::Constant => None,
            BoundaryMode::Clamp => Some(index.clamp(0, len - 1) as usize),
            BoundaryMode::Periodic => Some(index.rem_euclid(len) as usize),
            BoundaryMode::Mirror => {
                if n == 1 {
                    return Some(0);
                }
                let period = 2 * (len - 1);
                let r = index.rem_euclid(period);
                Some(if r < len { r } else { period - r } as usize)
            }
        }
    }

    /// Parse the lowercase name used in configuration strings.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mirror" => Some(BoundaryMode::Mirror),
            "constant" | "zero" => Some(BoundaryMode::Constant),
            "clamp" | "repeat" => Some(BoundaryMode::Clamp),
            "periodic" => Some(BoundaryMode::Periodic),
            _ => None,
        }
    }
}
