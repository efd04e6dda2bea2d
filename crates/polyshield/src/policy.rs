//! Untrusted control policies.
//!
//! The shield treats a policy as a black box `state -> action`. It never
//! inspects its internals and validates every returned action's length.

use crate::spaces::{Box, Space};
use crate::{Result, ShieldError};
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Trait for policies proposing actions
pub trait Policy {
    /// Propose an action for `state`
    fn act(&mut self, state: ArrayView1<f64>) -> Result<Array1<f64>>;
}

impl<P: Policy + ?Sized> Policy for std::boxed::Box<P> {
    fn act(&mut self, state: ArrayView1<f64>) -> Result<Array1<f64>> {
        (**self).act(state)
    }
}

/// Adapter turning a closure into a [`Policy`].
pub struct FnPolicy<F> {
    f: F,
}

impl<F> FnPolicy<F>
where
    F: FnMut(ArrayView1<f64>) -> Array1<f64>,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Policy for FnPolicy<F>
where
    F: FnMut(ArrayView1<f64>) -> Array1<f64>,
{
    fn act(&mut self, state: ArrayView1<f64>) -> Result<Array1<f64>> {
        Ok((self.f)(state))
    }
}

/// Uniformly random actions from a box.
pub struct RandomPolicy {
    space: Box,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(space: Box, seed: u64) -> Self {
        Self {
            space,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, _state: ArrayView1<f64>) -> Result<Array1<f64>> {
        Ok(self.space.sample(&mut self.rng))
    }
}

/// Adds Gaussian exploration noise to another policy, clipped to a box.
///
/// Makes a deterministic policy resamplable, which the cost-critic shield
/// relies on.
pub struct NoisyPolicy<P> {
    inner: P,
    space: Box,
    noise: Normal<f64>,
    rng: StdRng,
}

impl<P: Policy> NoisyPolicy<P> {
    pub fn new(inner: P, space: Box, std: f64, seed: u64) -> Result<Self> {
        if !(std >= 0.0 && std.is_finite()) {
            return Err(ShieldError::Configuration(format!(
                "noise std must be finite and non-negative, got {std}"
            )));
        }
        let noise = Normal::new(0.0, std)
            .map_err(|e| ShieldError::Configuration(format!("invalid noise std {std}: {e}")))?;
        Ok(Self {
            inner,
            space,
            noise,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl<P: Policy> Policy for NoisyPolicy<P> {
    fn act(&mut self, state: ArrayView1<f64>) -> Result<Array1<f64>> {
        let mean = self.inner.act(state)?;
        let noisy = mean.mapv(|m| m + self.noise.sample(&mut self.rng));
        Ok(self.space.clip(&noisy))
    }
}
