//! Time-unrolled safety constraints.
//!
//! For a polytope `P x + b <= 0` and local dynamics `x' = A x + B u + c` with
//! error radius `eps`, the condition "the state at step `j` is inside the
//! polytope" is pulled back to the current state `x0` and the actions
//! `u_0 .. u_{j-1}`:
//!
//! ```text
//! F[j][j] = P                 h[j][j] = b
//! F[j][t] = F[j][t+1] A       G[j][t] = F[j][t+1] B
//! h[j][t] = F[j][t+1] c + h[j][t+1] + |F[j][t+1]| eps
//! ```
//!
//! so that step `j` is safe when `Σ_t G[j][t] u_t + h[j][0] + F[j][0] x0 <= 0`.
//! Every quantity depends only on the lag `j - t`, so the builder stores one
//! entry per lag instead of the full triangle.

use crate::dynamics::LocalDynamics;
use crate::region::Polytope;
use crate::spaces::Box;
use crate::{ensure_len, Result, ShieldError};
use ndarray::{s, Array1, Array2, ArrayView1};

/// Pulled-back constraint matrices for one polytope.
#[derive(Clone, Debug)]
pub struct HorizonSystem {
    horizon: usize,
    /// `P A^d` for lag `d = 0..=H`
    normals: Vec<Array2<f64>>,
    /// `P A^(d-1) B` for lag `d = 1..=H`, stored at `d - 1`
    couplings: Vec<Array2<f64>>,
    /// Accumulated offsets for lag `d = 0..=H`
    offsets: Vec<Array1<f64>>,
}

impl HorizonSystem {
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// `F[j][t]` for `0 <= t <= j <= H`.
    pub fn f(&self, j: usize, t: usize) -> &Array2<f64> {
        assert!(t <= j && j <= self.horizon, "F[{j}][{t}] out of range");
        &self.normals[j - t]
    }

    /// `G[j][t]` for `0 <= t < j <= H`.
    pub fn g(&self, j: usize, t: usize) -> &Array2<f64> {
        assert!(t < j && j <= self.horizon, "G[{j}][{t}] out of range");
        &self.couplings[j - t - 1]
    }

    /// `h[j][t]` for `0 <= t <= j <= H`.
    pub fn h(&self, j: usize, t: usize) -> &Array1<f64> {
        assert!(t <= j && j <= self.horizon, "h[{j}][{t}] out of range");
        &self.offsets[j - t]
    }

    fn rows(&self) -> usize {
        self.normals[0].nrows()
    }

    fn action_dim(&self) -> usize {
        self.couplings.first().map_or(0, |g| g.ncols())
    }
}

/// Linear system `M u + bias <= 0` over the stacked actions `[u_0; ...; u_{H-1}]`.
#[derive(Clone, Debug)]
pub struct ConstraintSystem {
    pub matrix: Array2<f64>,
    pub bias: Array1<f64>,
    action_dim: usize,
    safety_rows: usize,
}

impl ConstraintSystem {
    pub fn num_vars(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Number of leading rows that encode safety (the rest are action bounds).
    pub fn safety_rows(&self) -> usize {
        self.safety_rows
    }

    /// Substitute `u_0 = first` and keep the system over `u_1 .. u_{H-1}`.
    pub fn fix_first_action(&self, first: ArrayView1<f64>) -> ConstraintSystem {
        let u = self.action_dim;
        let head = self.matrix.slice(s![.., ..u]);
        ConstraintSystem {
            matrix: self.matrix.slice(s![.., u..]).to_owned(),
            bias: &self.bias + &head.dot(&first),
            action_dim: u,
            safety_rows: self.safety_rows,
        }
    }

    /// Largest entry of `M u + bias`; the point is feasible when this is `<= 0`.
    pub fn max_violation(&self, u: ArrayView1<f64>) -> f64 {
        (self.matrix.dot(&u) + &self.bias)
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
    }

    /// Right-hand side for the solver form `M u <= -bias`.
    pub fn upper_bounds(&self) -> Array1<f64> {
        -&self.bias
    }
}

/// Builds horizon systems for a fixed horizon `H >= 1`.
#[derive(Clone, Copy, Debug)]
pub struct HorizonConstraintBuilder {
    horizon: usize,
}

impl HorizonConstraintBuilder {
    pub fn new(horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(ShieldError::InvalidHorizon(horizon));
        }
        Ok(Self { horizon })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Propagate `poly` backwards through `dynamics` for `H` steps.
    pub fn build(&self, poly: &Polytope, dynamics: &LocalDynamics) -> Result<HorizonSystem> {
        ensure_len("polytope dimension", dynamics.state_dim(), poly.dim())?;

        let mut normals = Vec::with_capacity(self.horizon + 1);
        let mut couplings = Vec::with_capacity(self.horizon);
        let mut offsets = Vec::with_capacity(self.horizon + 1);
        normals.push(poly.normals().clone());
        offsets.push(poly.offsets().clone());

        for d in 1..=self.horizon {
            let prev = &normals[d - 1];
            // eps is an interval radius: take the worst case per row.
            let worst = prev.mapv(f64::abs).dot(&dynamics.eps);
            let offset = prev.dot(&dynamics.c) + &offsets[d - 1] + worst;
            let coupling = prev.dot(&dynamics.b);
            let normal = prev.dot(&dynamics.a);
            offsets.push(offset);
            couplings.push(coupling);
            normals.push(normal);
        }

        Ok(HorizonSystem {
            horizon: self.horizon,
            normals,
            couplings,
            offsets,
        })
    }

    /// Stack the safety rows for `j = 1..=H` and the per-step action bounds.
    pub fn assemble(
        &self,
        system: &HorizonSystem,
        x0: ArrayView1<f64>,
        bounds: &Box,
    ) -> Result<ConstraintSystem> {
        let horizon = system.horizon();
        let k = system.rows();
        let u = bounds.dim();
        ensure_len("state", system.normals[0].ncols(), x0.len())?;
        ensure_len("action bounds", system.action_dim(), u)?;

        let safety_rows = horizon * k;
        let rows = safety_rows + 2 * horizon * u;
        let mut matrix = Array2::zeros((rows, horizon * u));
        let mut bias = Array1::zeros(rows);

        for j in 1..=horizon {
            let r0 = (j - 1) * k;
            for t in 0..j {
                matrix
                    .slice_mut(s![r0..r0 + k, t * u..(t + 1) * u])
                    .assign(system.g(j, t));
            }
            let offset = system.h(j, 0) + &system.f(j, 0).dot(&x0);
            bias.slice_mut(s![r0..r0 + k]).assign(&offset);
        }

        for t in 0..horizon {
            let r0 = safety_rows + 2 * t * u;
            for i in 0..u {
                matrix[[r0 + i, t * u + i]] = 1.0;
                bias[r0 + i] = -bounds.high[i];
                matrix[[r0 + u + i, t * u + i]] = -1.0;
                bias[r0 + u + i] = bounds.low[i];
            }
        }

        Ok(ConstraintSystem {
            matrix,
            bias,
            action_dim: u,
            safety_rows,
        })
    }
}
