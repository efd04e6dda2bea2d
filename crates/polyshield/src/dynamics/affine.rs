//! Global affine model.

use super::{LocalDynamics, LocalModelProvider};
use crate::{ensure_len, Result};
use ndarray::ArrayView1;

/// A model whose linearization is the same everywhere.
///
/// Fits identified linear systems and symbolic models that were already
/// reduced to `x' = A x + B u + c` with a fixed error bound.
#[derive(Clone, Debug)]
pub struct AffineModel {
    dynamics: LocalDynamics,
}

impl AffineModel {
    pub fn new(dynamics: LocalDynamics) -> Self {
        Self { dynamics }
    }

    pub fn dynamics(&self) -> &LocalDynamics {
        &self.dynamics
    }
}

impl LocalModelProvider for AffineModel {
    fn local_dynamics(&self, point: ArrayView1<f64>, state_dim: usize) -> Result<LocalDynamics> {
        ensure_len("model state dimension", state_dim, self.dynamics.state_dim())?;
        ensure_len(
            "linearization point",
            self.dynamics.state_dim() + self.dynamics.action_dim(),
            point.len(),
        )?;
        Ok(self.dynamics.clone())
    }
}
