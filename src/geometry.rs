//! Geometry and scoring primitives.
//!
//! Pure functions over landmark positions. Angles are in degrees.

use crate::constants::{EPSILON, HUBER_TAIL_GAIN};
use nalgebra::Vector3;

/// Euclidean distance between two points
#[must_use]
pub fn distance_3d(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a - b).norm()
}

/// Midpoint of two points
#[must_use]
pub fn midpoint(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
    (a + b) * 0.5
}

/// Angle at vertex `b` between rays `b→a` and `b→c`
///
/// Returns `None` when either ray has zero length.
#[must_use]
pub fn angle_at_vertex(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> Option<f64> {
    let ba = a - b;
    let bc = c - b;
    let na = ba.norm();
    let nc = bc.norm();
    if na == 0.0 || nc == 0.0 || !na.is_finite() || !nc.is_finite() {
        return None;
    }

    let cos = (ba.dot(&bc) / (na * nc)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Logistic falloff around `center`: `max_score / (1 + e^(|x - center| / width))`
///
/// Peaks at `max_score / 2` when `x == center`.
#[must_use]
pub fn sigmoid_score(x: f64, center: f64, width: f64, max_score: f64) -> f64 {
    let distance = (x - center).abs() / width.max(EPSILON);
    max_score / (1.0 + distance.exp())
}

/// Huber-like penalty in [0, 1] with the default tail gain
#[must_use]
pub fn huber_like(err: f64, delta: f64) -> f64 {
    huber_like_with_gain(err, delta, HUBER_TAIL_GAIN)
}

/// Huber-like penalty in [0, 1]
///
/// Linear `1 - |err| / delta` inside the tolerance, `gain * delta / |err|`
/// beyond it.
#[must_use]
pub fn huber_like_with_gain(err: f64, delta: f64, gain: f64) -> f64 {
    let delta = delta.max(EPSILON);
    let a = err.abs();
    if a.is_nan() {
        return 0.0;
    }
    if a <= delta {
        1.0 - a / delta
    } else {
        (gain * delta / a).clamp(0.0, 1.0)
    }
}

/// True iff at least `min_fraction` of `visibilities` are `>= threshold`
///
/// Empty input never passes.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn visibility_gate_ok(visibilities: &[f64], threshold: f64, min_fraction: f64) -> bool {
    if visibilities.is_empty() {
        return false;
    }
    let passing = visibilities.iter().filter(|&&v| v >= threshold).count();
    passing as f64 / visibilities.len() as f64 >= min_fraction
}
