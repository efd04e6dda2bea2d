//! Utility functions.

use ndarray::{Array1, ArrayView1};

/// Element-wise approximate equality: `|a - b| <= atol + rtol * |b|`.
///
/// Vectors of different lengths are never close.
pub fn allclose(a: ArrayView1<f64>, b: ArrayView1<f64>, rtol: f64, atol: f64) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(&x, &y)| (x - y).abs() <= atol + rtol * y.abs())
}

/// Concatenate a state and an action into a linearization point.
pub fn concat(state: ArrayView1<f64>, action: ArrayView1<f64>) -> Array1<f64> {
    state.iter().chain(action.iter()).copied().collect()
}

/// Format a latency in seconds using the largest unit that keeps it above one.
pub fn format_duration(seconds: f64) -> String {
    match seconds {
        s if !(s > 0.0) => "0s".to_string(),
        s if s < 1e-3 => format!("{:.1}us", s * 1e6),
        s if s < 1.0 => format!("{:.2}ms", s * 1e3),
        s => format!("{s:.3}s"),
    }
}
