// Density target calculator.
//
// Maps the normalized [0, 1] busyness parameter to an integer target count
// of onsets for one (bar, role). Pure and idempotent — no randomness, no
// state. The explanation string is for support/debugging output only; it is
// never load-bearing for correctness.
//
// Rounding is half-away-from-zero (`f64::round`). This is contractual: the
// documented edge cases (0.5 × 5 → 3, not 2) depend on it, so a different
// rounding mode must not be substituted.

use serde::{Deserialize, Serialize};

/// The computed onset target for one bar and role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityTarget {
    /// Number of onsets selection should aim for, in [0, capacity].
    pub target: u32,
    /// Human-readable account of the inputs and result.
    pub explanation: String,
}

/// Compute the onset target from density and bar capacity.
///
/// Out-of-range densities are clamped into [0, 1] (a NaN density counts as
/// zero); the result is clamped into [0, capacity].
pub fn density_target(density: f64, capacity: u32) -> DensityTarget {
    let clamped = if density.is_finite() {
        density.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let raw = clamped * f64::from(capacity);
    let target = (raw.round() as u32).min(capacity);
    let explanation = format!(
        "density {clamped:.3} x capacity {capacity} = {raw:.3}, rounds to target {target}"
    );
    DensityTarget {
        target,
        explanation,
    }
}
