//! Numerical linearization of black-box transition functions.

use super::{LocalDynamics, LocalModelProvider};
use crate::{Result, ShieldError};
use ndarray::{Array1, Array2, ArrayView1};

/// Linearizes `f(x, u) -> x'` by central differences at the query point.
///
/// Suitable for learned (neural or hybrid) models that can be evaluated but
/// not differentiated symbolically. `eps` is the caller's bound on the
/// model's local error and is passed through unchanged.
pub struct FiniteDifferenceModel<F> {
    transition: F,
    step: f64,
    eps: Array1<f64>,
}

impl<F> FiniteDifferenceModel<F>
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> Array1<f64>,
{
    pub fn new(transition: F, eps: Array1<f64>) -> Self {
        Self {
            transition,
            step: 1e-5,
            eps,
        }
    }

    /// Set the perturbation size
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    fn column(&self, x: &Array1<f64>, u: &Array1<f64>, perturb_state: bool, i: usize) -> Array1<f64> {
        let (mut x_hi, mut x_lo) = (x.clone(), x.clone());
        let (mut u_hi, mut u_lo) = (u.clone(), u.clone());
        if perturb_state {
            x_hi[i] += self.step;
            x_lo[i] -= self.step;
        } else {
            u_hi[i] += self.step;
            u_lo[i] -= self.step;
        }
        let hi = (self.transition)(x_hi.view(), u_hi.view());
        let lo = (self.transition)(x_lo.view(), u_lo.view());
        (hi - lo) / (2.0 * self.step)
    }
}

impl<F> LocalModelProvider for FiniteDifferenceModel<F>
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>) -> Array1<f64>,
{
    fn local_dynamics(&self, point: ArrayView1<f64>, state_dim: usize) -> Result<LocalDynamics> {
        if point.len() < state_dim {
            return Err(ShieldError::mismatch("linearization point", state_dim, point.len()));
        }
        let u_dim = point.len() - state_dim;
        let x = point.slice(ndarray::s![..state_dim]).to_owned();
        let u = point.slice(ndarray::s![state_dim..]).to_owned();

        let center = (self.transition)(x.view(), u.view());
        if center.len() != state_dim {
            return Err(ShieldError::Model(format!(
                "transition returned {} components for a {}-dimensional state",
                center.len(),
                state_dim
            )));
        }

        let mut a = Array2::zeros((state_dim, state_dim));
        for i in 0..state_dim {
            a.column_mut(i).assign(&self.column(&x, &u, true, i));
        }
        let mut b = Array2::zeros((state_dim, u_dim));
        for i in 0..u_dim {
            b.column_mut(i).assign(&self.column(&x, &u, false, i));
        }
        let c = &center - &a.dot(&x) - &b.dot(&u);

        if a.iter().chain(b.iter()).chain(c.iter()).any(|v| !v.is_finite()) {
            return Err(ShieldError::Model("linearization produced non-finite values".into()));
        }
        LocalDynamics::new(a, b, c, self.eps.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_recovers_affine_dynamics() {
        let model = FiniteDifferenceModel::new(
            |x: ArrayView1<f64>, u: ArrayView1<f64>| {
                array![x[0] + 0.1 * x[1] + 1.0, 0.9 * x[1] + 0.5 * u[0]]
            },
            array![0.0, 0.0],
        );
        let dynamics = model.local_dynamics(array![1.0, 2.0, 0.3].view(), 2).unwrap();

        let expected_a = array![[1.0, 0.1], [0.0, 0.9]];
        let expected_b = array![[0.0], [0.5]];
        for (got, want) in dynamics.a.iter().zip(expected_a.iter()) {
            assert!((got - want).abs() < 1e-6);
        }
        for (got, want) in dynamics.b.iter().zip(expected_b.iter()) {
            assert!((got - want).abs() < 1e-6);
        }
        assert!((dynamics.c[0] - 1.0).abs() < 1e-6);
        assert!(dynamics.c[1].abs() < 1e-6);
    }

    #[test]
    fn test_linearization_matches_at_point() {
        let f = |x: ArrayView1<f64>, u: ArrayView1<f64>| array![x[0] + 0.2 * x[0].sin() + u[0]];
        let model = FiniteDifferenceModel::new(f, array![0.05]);
        let point = array![0.7, -0.3];
        let dynamics = model.local_dynamics(point.view(), 1).unwrap();

        let predicted = dynamics.step(array![0.7].view(), array![-0.3].view());
        let actual = f(array![0.7].view(), array![-0.3].view());
        assert!((predicted[0] - actual[0]).abs() < 1e-8);
        assert_eq!(dynamics.eps, array![0.05]);
    }

    #[test]
    fn test_wrong_output_length() {
        let model = FiniteDifferenceModel::new(
            |_x: ArrayView1<f64>, _u: ArrayView1<f64>| array![0.0, 0.0, 0.0],
            array![0.0, 0.0],
        );
        assert!(matches!(
            model.local_dynamics(array![0.0, 0.0, 0.0].view(), 2),
            Err(ShieldError::Model(_))
        ));
    }
}
