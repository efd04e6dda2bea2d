//! Backup controller used when no safe projection exists.
//!
//! The backup ignores the policy. It finds the nearest unsafe polytope, takes
//! the direction from the state towards it, and plans the action sequence
//! that moves the linear model as far as possible the other way after `H`
//! steps. Only the first action is returned.

use crate::config::SolverConfig;
use crate::dynamics::LocalDynamics;
use crate::region::Polytope;
use crate::solver::{BoxLinearProgram, QuadraticProgram};
use crate::spaces::Box;
use crate::{ensure_len, Result, ShieldError};
use ndarray::{s, Array1, ArrayView1};
use tracing::{debug, warn};

/// Norms below this mean `x0` is on or inside an unsafe polytope.
const MIN_DIRECTION_NORM: f64 = 1e-12;

#[derive(Clone, Debug)]
pub struct BackupController {
    unsafe_polytopes: Vec<Polytope>,
    bounds: Box,
    horizon: usize,
    solver: SolverConfig,
}

impl BackupController {
    pub fn new(
        unsafe_polytopes: Vec<Polytope>,
        bounds: Box,
        horizon: usize,
        solver: SolverConfig,
    ) -> Result<Self> {
        if horizon == 0 {
            return Err(ShieldError::InvalidHorizon(horizon));
        }
        if let Some(first) = unsafe_polytopes.first() {
            for p in &unsafe_polytopes[1..] {
                ensure_len("unsafe polytope dimension", first.dim(), p.dim())?;
            }
        }
        Ok(Self {
            unsafe_polytopes,
            bounds,
            horizon,
            solver,
        })
    }

    pub fn unsafe_polytopes(&self) -> &[Polytope] {
        &self.unsafe_polytopes
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Unit vector from `x0` towards the closest unsafe polytope.
    ///
    /// For each unsafe polytope this solves `min ‖p‖²` subject to
    /// `P (x0 + p) + b <= 0`. When `x0` already lies in the closest one
    /// (on its boundary or inside) `p` vanishes, and the direction is the
    /// inward normal of that polytope's tightest row instead. Returns `None`
    /// when no unsafe polytope is reachable.
    pub fn retreat_direction(&self, x0: ArrayView1<f64>) -> Option<Array1<f64>> {
        let mut best: Option<(f64, Array1<f64>, &Polytope)> = None;
        for (index, poly) in self.unsafe_polytopes.iter().enumerate() {
            if poly.dim() != x0.len() {
                continue;
            }
            let upper = -(poly.offsets() + &poly.normals().dot(&x0));
            let qp = QuadraticProgram::min_norm(poly.normals().clone(), upper);
            let Some(p) = qp.solve(&self.solver).into_optimal() else {
                debug!(polytope = index, "unsafe polytope unreachable");
                continue;
            };
            let norm = p.dot(&p).sqrt();
            if best.as_ref().map_or(true, |(b, _, _)| norm < *b) {
                best = Some((norm, p, poly));
            }
        }

        let (norm, p, poly) = best?;
        if norm >= MIN_DIRECTION_NORM {
            return Some(p / norm);
        }
        warn!("state lies on or inside an unsafe polytope");
        inward_normal(poly, x0)
    }

    /// Objective `m` with `m · u = -direction · x_H` up to a constant.
    ///
    /// Block `t` is `(A^(H-t-1) B)ᵀ (-direction)`.
    pub fn retreat_objective(&self, direction: ArrayView1<f64>, dynamics: &LocalDynamics) -> Array1<f64> {
        let u = dynamics.action_dim();
        let target = -&direction;
        let mut m = Array1::zeros(self.horizon * u);
        let mut power_b = dynamics.b.clone();
        for k in 0..self.horizon {
            let t = self.horizon - k - 1;
            m.slice_mut(s![t * u..(t + 1) * u])
                .assign(&power_b.t().dot(&target));
            power_b = dynamics.a.dot(&power_b);
        }
        m
    }

    /// Plan the full `H`-step retreat sequence.
    pub fn plan(&self, x0: ArrayView1<f64>, dynamics: &LocalDynamics) -> Result<Array1<f64>> {
        ensure_len("action bounds", dynamics.action_dim(), self.bounds.dim())?;
        ensure_len("state", dynamics.state_dim(), x0.len())?;
        if let Some(i) = self.bounds.first_inverted() {
            return Err(ShieldError::Configuration(format!(
                "action bound {i} is empty: low {} > high {}",
                self.bounds.low[i], self.bounds.high[i]
            )));
        }

        let Some(direction) = self.retreat_direction(x0) else {
            debug!("no reachable unsafe polytope");
            let rest = self.bounds.closest_to_zero();
            return Ok(tile(&rest, self.horizon));
        };
        let objective = self.retreat_objective(direction.view(), dynamics);

        let low = tile(&self.bounds.low, self.horizon);
        let high = tile(&self.bounds.high, self.horizon);
        let solution = BoxLinearProgram::new(objective, low, high).maximize();
        let status = solution.status;
        solution.into_optimal().ok_or_else(|| {
            ShieldError::Configuration(format!(
                "backup linear program is {status}: action bounds must form a finite, non-empty box"
            ))
        })
    }

    /// First action of the retreat plan.
    pub fn select(&self, x0: ArrayView1<f64>, dynamics: &LocalDynamics) -> Result<Array1<f64>> {
        let plan = self.plan(x0, dynamics)?;
        Ok(plan.slice(s![..self.bounds.dim()]).to_owned())
    }
}

/// Normalized `-P_i` for the row of `poly` with the largest margin at `x0`.
fn inward_normal(poly: &Polytope, x0: ArrayView1<f64>) -> Option<Array1<f64>> {
    let margins = poly.margins(x0);
    let (row, norm) = poly
        .normals()
        .rows()
        .into_iter()
        .zip(margins.iter())
        .map(|(row, &m)| (row, row.dot(&row).sqrt(), m))
        .filter(|(_, norm, _)| *norm >= MIN_DIRECTION_NORM)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(row, norm, _)| (row, norm))?;
    Some(row.mapv(|v| -v / norm))
}

fn tile(v: &Array1<f64>, times: usize) -> Array1<f64> {
    v.iter().copied().cycle().take(v.len() * times).collect()
}
