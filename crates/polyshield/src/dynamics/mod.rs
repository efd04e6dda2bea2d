//! Local linear models of the environment.
//!
//! The shield never sees the real dynamics. It asks a [`LocalModelProvider`]
//! for an affine approximation `x' = A x + B u + c` around the current
//! state-action point, together with a per-dimension error radius `eps`.
//! Providers:
//! - [`AffineModel`] - one global affine model (symbolic/identified systems)
//! - [`FiniteDifferenceModel`] - linearizes any black-box transition function

mod affine;
mod finite_difference;

pub use affine::AffineModel;
pub use finite_difference::FiniteDifferenceModel;

use crate::{ensure_len, Result, ShieldError};
use ndarray::{s, Array1, Array2, ArrayView1};

/// Affine approximation of the dynamics, valid only near the point it was
/// computed at. Computed fresh for every decision.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalDynamics {
    /// State transition, `s_dim x s_dim`
    pub a: Array2<f64>,
    /// Input coupling, `s_dim x u_dim`
    pub b: Array2<f64>,
    /// Constant offset, `s_dim`
    pub c: Array1<f64>,
    /// Worst-case linearization error per state dimension, `s_dim`
    pub eps: Array1<f64>,
}

impl LocalDynamics {
    pub fn new(a: Array2<f64>, b: Array2<f64>, c: Array1<f64>, eps: Array1<f64>) -> Result<Self> {
        let s_dim = a.nrows();
        ensure_len("A columns", s_dim, a.ncols())?;
        ensure_len("B rows", s_dim, b.nrows())?;
        ensure_len("c", s_dim, c.len())?;
        ensure_len("eps", s_dim, eps.len())?;
        if eps.iter().any(|&e| !(e >= 0.0)) {
            return Err(ShieldError::Model(
                "linearization error radius must be non-negative".into(),
            ));
        }
        Ok(Self { a, b, c, eps })
    }

    /// Split an augmented `[A | B | c]` matrix of shape `s_dim x (s_dim + u_dim + 1)`.
    pub fn from_augmented(mat: &Array2<f64>, eps: Array1<f64>) -> Result<Self> {
        let s_dim = mat.nrows();
        if mat.ncols() < s_dim + 1 {
            return Err(ShieldError::mismatch("augmented model columns", s_dim + 1, mat.ncols()));
        }
        let u_end = mat.ncols() - 1;
        Self::new(
            mat.slice(s![.., ..s_dim]).to_owned(),
            mat.slice(s![.., s_dim..u_end]).to_owned(),
            mat.column(u_end).to_owned(),
            eps,
        )
    }

    /// A model with no linearization error.
    pub fn exact(a: Array2<f64>, b: Array2<f64>, c: Array1<f64>) -> Result<Self> {
        let eps = Array1::zeros(a.nrows());
        Self::new(a, b, c, eps)
    }

    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn action_dim(&self) -> usize {
        self.b.ncols()
    }

    /// Predict the next state under the affine model (ignoring `eps`).
    pub fn step(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
        self.a.dot(&x) + self.b.dot(&u) + &self.c
    }

    /// Roll the model forward from `x0`, returning `x_1 ..= x_n` for `n` actions.
    pub fn rollout(&self, x0: ArrayView1<f64>, actions: &[Array1<f64>]) -> Vec<Array1<f64>> {
        let mut states = Vec::with_capacity(actions.len());
        let mut x = x0.to_owned();
        for u in actions {
            x = self.step(x.view(), u.view());
            states.push(x.clone());
        }
        states
    }

    /// Check the model against the dimensions the caller is configured for.
    pub fn check_dims(&self, s_dim: usize, u_dim: usize) -> Result<()> {
        ensure_len("model state dimension", s_dim, self.state_dim())?;
        ensure_len("model action dimension", u_dim, self.action_dim())
    }
}

/// Capability to produce a local linear model at a state-action point.
///
/// `point` is the state followed by the action. Implementations only need to
/// be valid in *some* neighbourhood of the point; the shield does not check
/// the neighbourhood radius.
pub trait LocalModelProvider {
    fn local_dynamics(&self, point: ArrayView1<f64>, state_dim: usize) -> Result<LocalDynamics>;
}

impl<M: LocalModelProvider + ?Sized> LocalModelProvider for &M {
    fn local_dynamics(&self, point: ArrayView1<f64>, state_dim: usize) -> Result<LocalDynamics> {
        (**self).local_dynamics(point, state_dim)
    }
}

impl<M: LocalModelProvider + ?Sized> LocalModelProvider for std::boxed::Box<M> {
    fn local_dynamics(&self, point: ArrayView1<f64>, state_dim: usize) -> Result<LocalDynamics> {
        (**self).local_dynamics(point, state_dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_augmented() {
        let mat = array![[1.0, 0.0, 0.5, 0.1], [0.0, 1.0, 0.0, 0.2]];
        let dynamics = LocalDynamics::from_augmented(&mat, array![0.0, 0.01]).unwrap();
        assert_eq!(dynamics.a, array![[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(dynamics.b, array![[0.5], [0.0]]);
        assert_eq!(dynamics.c, array![0.1, 0.2]);
        assert_eq!(dynamics.action_dim(), 1);
    }

    #[test]
    fn test_shape_validation() {
        let err = LocalDynamics::exact(array![[1.0, 0.0]], array![[1.0]], array![0.0]);
        assert!(matches!(err, Err(ShieldError::DimensionMismatch { .. })));

        let err = LocalDynamics::new(
            array![[1.0]],
            array![[1.0]],
            array![0.0],
            array![-0.1],
        );
        assert!(matches!(err, Err(ShieldError::Model(_))));
    }

    #[test]
    fn test_rollout() {
        let dynamics =
            LocalDynamics::exact(array![[1.0, 1.0], [0.0, 1.0]], array![[0.0], [1.0]], array![0.0, 0.0])
                .unwrap();
        let states = dynamics.rollout(array![0.0, 0.0].view(), &[array![1.0], array![0.0]]);
        assert_eq!(states, vec![array![0.0, 1.0], array![1.0, 1.0]]);
    }
}
