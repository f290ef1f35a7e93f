//! transform.rs — Normalisation helpers for controller inputs

/// Squash `x` into `(-1, 1)` with a scaled tanh.
///
/// `nominal_range` should sit on the high side of what `x` normally reaches;
/// an input of exactly `nominal_range` maps to `tanh(1) ≈ 0.76`.
pub fn centered_rolloff(x: f64, nominal_range: f64) -> f64 {
    (x / nominal_range).tanh()
}
