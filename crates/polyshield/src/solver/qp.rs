//! Dual active-set QP solver.
//!
//! Solves
//!
//! ```text
//! minimize   ½ xᵀ Q x + qᵀ x
//! subject to G x <= h
//! ```
//!
//! for symmetric positive definite `Q` using the method of Goldfarb and
//! Idnani (1983). The method starts at the unconstrained minimum and adds
//! violated constraints one at a time while keeping the active set dual
//! feasible, so it either ends at the optimum or proves infeasibility when a
//! violated constraint cannot be satisfied by any move that keeps the active
//! multipliers non-negative.

use super::{Solution, SolveStatus};
use crate::config::SolverConfig;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Directions shorter than this are treated as zero.
const ZERO_STEP: f64 = 1e-12;

/// Dense inequality-constrained QP.
#[derive(Clone, Debug)]
pub struct QuadraticProgram {
    /// Positive definite Hessian `Q`, `n x n`
    pub hessian: Array2<f64>,
    /// Linear term `q`, `n`
    pub linear: Array1<f64>,
    /// Constraint matrix `G`, `m x n`
    pub constraints: Array2<f64>,
    /// Constraint bounds `h`, `m`
    pub bounds: Array1<f64>,
}

impl QuadraticProgram {
    pub fn new(
        hessian: Array2<f64>,
        linear: Array1<f64>,
        constraints: Array2<f64>,
        bounds: Array1<f64>,
    ) -> Self {
        debug_assert_eq!(hessian.nrows(), hessian.ncols());
        debug_assert_eq!(hessian.nrows(), linear.len());
        debug_assert_eq!(constraints.ncols(), linear.len());
        debug_assert_eq!(constraints.nrows(), bounds.len());
        Self {
            hessian,
            linear,
            constraints,
            bounds,
        }
    }

    /// Minimum-norm problem `min ‖x‖²` subject to `G x <= h`.
    pub fn min_norm(constraints: Array2<f64>, bounds: Array1<f64>) -> Self {
        let n = constraints.ncols();
        Self::new(
            Array2::eye(n) * 2.0,
            Array1::zeros(n),
            constraints,
            bounds,
        )
    }

    pub fn dim(&self) -> usize {
        self.linear.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.bounds.len()
    }

    /// Largest constraint violation `max(G x - h)`, or `-inf` without constraints.
    pub fn max_violation(&self, x: &Array1<f64>) -> f64 {
        (self.constraints.dot(x) - &self.bounds)
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
    }

    pub fn objective(&self, x: &Array1<f64>) -> f64 {
        0.5 * x.dot(&self.hessian.dot(x)) + self.linear.dot(x)
    }

    pub fn solve(&self, config: &SolverConfig) -> Solution {
        let n = self.dim();
        let m = self.num_constraints();
        let tol = config.feasibility_tol;

        let finite_data = self
            .hessian
            .iter()
            .chain(self.linear.iter())
            .chain(self.constraints.iter())
            .all(|v| v.is_finite());
        if !finite_data || self.bounds.iter().any(|v| v.is_nan()) {
            return Solution::failed(SolveStatus::NumericalError, n, 0);
        }

        // No free variables: every row is a constant check `0 <= h`.
        if n == 0 {
            let status = if self.bounds.iter().all(|&h| h >= -tol) {
                SolveStatus::Optimal
            } else {
                SolveStatus::Infeasible
            };
            return Solution::failed(status, 0, 0);
        }

        let q_mat = DMatrix::from_fn(n, n, |i, j| self.hessian[[i, j]]);
        let w = match q_mat.cholesky() {
            Some(chol) => chol.inverse(),
            None => return Solution::failed(SolveStatus::NumericalError, n, 0),
        };

        // Goldfarb-Idnani works with `nᵢᵀ x >= bᵢ`; here nᵢ = -Gᵢ and bᵢ = -hᵢ.
        let normals: Vec<DVector<f64>> = (0..m)
            .map(|i| DVector::from_fn(n, |j, _| -self.constraints[[i, j]]))
            .collect();
        let rhs: Vec<f64> = self.bounds.iter().map(|&h| -h).collect();
        let slack = |x: &DVector<f64>, i: usize| normals[i].dot(x) - rhs[i];

        let linear = DVector::from_fn(n, |i, _| self.linear[i]);
        let mut x = -(&w * &linear);
        let mut active: Vec<usize> = Vec::new();
        let mut multipliers: Vec<f64> = Vec::new();
        let mut iterations = 0usize;

        loop {
            // Step 1: pick the most violated inactive constraint.
            let mut chosen: Option<(usize, f64)> = None;
            for i in 0..m {
                if active.contains(&i) {
                    continue;
                }
                let s = slack(&x, i);
                if s < -tol && chosen.map_or(true, |(_, best)| s < best) {
                    chosen = Some((i, s));
                }
            }
            let Some((p, _)) = chosen else {
                let x = Array1::from_iter(x.iter().copied());
                if config.verbose {
                    tracing::trace!(iterations, active = active.len(), "qp optimal");
                }
                return Solution {
                    status: SolveStatus::Optimal,
                    x,
                    iterations,
                };
            };
            let n_p = &normals[p];
            let mut u_p = 0.0;

            // Step 2: move until p becomes active, dropping blocking constraints.
            loop {
                iterations += 1;
                if iterations > config.max_iterations {
                    return Solution::failed(SolveStatus::IterationLimit, n, iterations);
                }

                let k = active.len();
                let (z, r) = if k == 0 {
                    (&w * n_p, DVector::zeros(0))
                } else {
                    let basis = DMatrix::from_fn(n, k, |i, j| normals[active[j]][i]);
                    let w_basis = &w * &basis;
                    let gram = basis.transpose() * &w_basis;
                    let projected = w_basis.transpose() * n_p;
                    let Some(r) = gram.lu().solve(&projected) else {
                        return Solution::failed(SolveStatus::NumericalError, n, iterations);
                    };
                    let z = &w * n_p - &w_basis * &r;
                    (z, r)
                };

                // Largest dual step that keeps active multipliers non-negative.
                let mut t_dual = f64::INFINITY;
                let mut blocking = None;
                for j in 0..k {
                    if r[j] > ZERO_STEP {
                        let ratio = multipliers[j] / r[j];
                        if ratio < t_dual {
                            t_dual = ratio;
                            blocking = Some(j);
                        }
                    }
                }

                let step_scale = n_p.norm().max(1.0);
                if z.norm() <= ZERO_STEP * step_scale {
                    // p is linearly dependent on the active set.
                    let Some(l) = blocking else {
                        if config.verbose {
                            tracing::trace!(constraint = p, iterations, "qp infeasible");
                        }
                        return Solution::failed(SolveStatus::Infeasible, n, iterations);
                    };
                    for j in 0..k {
                        multipliers[j] -= t_dual * r[j];
                    }
                    u_p += t_dual;
                    active.remove(l);
                    multipliers.remove(l);
                    continue;
                }

                let t_primal = -slack(&x, p) / z.dot(n_p);
                let t = t_dual.min(t_primal);
                x += &z * t;
                for j in 0..k {
                    multipliers[j] -= t * r[j];
                }
                u_p += t;

                if t_primal <= t_dual {
                    active.push(p);
                    multipliers.push(u_p);
                    break;
                }
                if let Some(l) = blocking {
                    active.remove(l);
                    multipliers.remove(l);
                }
            }
        }
    }
}
