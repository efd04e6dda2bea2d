//! Linear programs over a box.

use super::{Solution, SolveStatus};
use ndarray::Array1;

/// Coefficients smaller than this do not pull a variable to a bound.
const ZERO_COEFF: f64 = 1e-12;

/// `maximize cᵀ x` subject to `low <= x <= high`.
///
/// The problem separates per coordinate, so the optimum is found exactly:
/// each variable goes to the bound its coefficient points at, and variables
/// with a zero coefficient take the in-bounds value nearest zero.
#[derive(Clone, Debug)]
pub struct BoxLinearProgram {
    pub objective: Array1<f64>,
    pub low: Array1<f64>,
    pub high: Array1<f64>,
}

impl BoxLinearProgram {
    pub fn new(objective: Array1<f64>, low: Array1<f64>, high: Array1<f64>) -> Self {
        debug_assert_eq!(objective.len(), low.len());
        debug_assert_eq!(objective.len(), high.len());
        Self {
            objective,
            low,
            high,
        }
    }

    pub fn maximize(&self) -> Solution {
        let n = self.objective.len();
        let mut x = Array1::zeros(n);
        for i in 0..n {
            let (c, l, h) = (self.objective[i], self.low[i], self.high[i]);
            if c.is_nan() || l.is_nan() || h.is_nan() {
                return Solution::failed(SolveStatus::NumericalError, n, 0);
            }
            if l > h {
                return Solution::failed(SolveStatus::Infeasible, n, 0);
            }
            let value = if c > ZERO_COEFF {
                h
            } else if c < -ZERO_COEFF {
                l
            } else {
                0.0f64.max(l).min(h)
            };
            if !value.is_finite() {
                return Solution::failed(SolveStatus::Unbounded, n, 0);
            }
            x[i] = value;
        }
        Solution {
            status: SolveStatus::Optimal,
            x,
            iterations: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_picks_bounds_by_sign() {
        let lp = BoxLinearProgram::new(
            array![1.0, -2.0, 0.0, 0.0],
            array![-1.0, -3.0, -1.0, 0.5],
            array![2.0, 3.0, 1.0, 1.0],
        );
        let sol = lp.maximize();
        assert!(sol.status.is_optimal());
        assert_eq!(sol.x, array![2.0, -3.0, 0.0, 0.5]);
    }

    #[test]
    fn test_inverted_box_is_infeasible() {
        let lp = BoxLinearProgram::new(array![1.0], array![1.0], array![-1.0]);
        assert_eq!(lp.maximize().status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_open_box_is_unbounded() {
        let lp = BoxLinearProgram::new(array![1.0], array![0.0], array![f64::INFINITY]);
        assert_eq!(lp.maximize().status, SolveStatus::Unbounded);
    }
}
