//! Dense convex solvers for the shield.
//!
//! - [`QuadraticProgram`] - strictly convex QP with inequality constraints,
//!   solved by the Goldfarb-Idnani dual active-set method
//! - [`BoxLinearProgram`] - linear objective over a box, solved in closed form
//!
//! Solvers never return errors. Anything that prevents a certified solution
//! (infeasibility, exhausted iteration budget, a singular system) is reported
//! as a non-optimal [`SolveStatus`], which callers treat as "infeasible for
//! this attempt".

mod lp;
mod qp;

pub use lp::BoxLinearProgram;
pub use qp::QuadraticProgram;

use ndarray::Array1;
use std::fmt;

/// Terminal state of a solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimal point found and feasible within tolerance
    Optimal,
    /// Constraints proven inconsistent
    Infeasible,
    /// Objective unbounded over the feasible set
    Unbounded,
    /// Iteration budget exhausted
    IterationLimit,
    /// Singular or non-finite data
    NumericalError,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == SolveStatus::Optimal
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::IterationLimit => "iteration limit",
            SolveStatus::NumericalError => "numerical error",
        };
        f.write_str(name)
    }
}

/// Result of a solve. `x` is only meaningful when `status` is optimal.
#[derive(Clone, Debug)]
pub struct Solution {
    pub status: SolveStatus,
    pub x: Array1<f64>,
    pub iterations: usize,
}

impl Solution {
    pub(crate) fn failed(status: SolveStatus, n: usize, iterations: usize) -> Self {
        Self {
            status,
            x: Array1::zeros(n),
            iterations,
        }
    }

    /// The optimal point, if there is one.
    pub fn into_optimal(self) -> Option<Array1<f64>> {
        match self.status {
            SolveStatus::Optimal => Some(self.x),
            _ => None,
        }
    }
}
