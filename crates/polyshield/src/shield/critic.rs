//! Resampling shield driven by a learned cost critic.
//!
//! This is a best-effort filter. It has no model of the environment and can
//! only pick among the policy's own samples, so it offers none of the
//! guarantees of [`Shield`](super::Shield). If no sample scores below the
//! threshold the least costly one is returned anyway.

use crate::policy::Policy;
use crate::utils::concat;
use crate::{Result, ShieldError};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scores `(state, action)` pairs; lower is safer.
pub trait CostCritic {
    fn cost(&self, state: ArrayView1<f64>, action: ArrayView1<f64>) -> Result<f64>;
}

/// Adapter turning a closure over the concatenated `[state, action]` into a
/// [`CostCritic`].
pub struct FnCritic<F> {
    f: F,
}

impl<F> FnCritic<F>
where
    F: Fn(ArrayView1<f64>) -> f64,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> CostCritic for FnCritic<F>
where
    F: Fn(ArrayView1<f64>) -> f64,
{
    fn cost(&self, state: ArrayView1<f64>, action: ArrayView1<f64>) -> Result<f64> {
        let input = concat(state, action);
        Ok((self.f)(input.view()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticConfig {
    /// Extra samples drawn after the first proposal
    pub max_attempts: usize,
    /// Proposals scoring at or below this are accepted
    pub threshold: f64,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            threshold: 0.2,
        }
    }
}

impl CriticConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Resamples a stochastic policy until the critic is satisfied.
pub struct CostCriticShield<P, C> {
    policy: P,
    critic: C,
    config: CriticConfig,
    accepted_times: u64,
    resampled_times: u64,
}

impl<P: Policy, C: CostCritic> CostCriticShield<P, C> {
    pub fn new(policy: P, critic: C, config: CriticConfig) -> Result<Self> {
        if !config.threshold.is_finite() {
            return Err(ShieldError::Configuration(format!(
                "critic threshold must be finite, got {}",
                config.threshold
            )));
        }
        Ok(Self {
            policy,
            critic,
            config,
            accepted_times: 0,
            resampled_times: 0,
        })
    }

    pub fn config(&self) -> &CriticConfig {
        &self.config
    }

    /// Sample, score and keep the least costly action.
    pub fn decide(&mut self, state: &Array1<f64>) -> Result<Array1<f64>> {
        let mut best = self.policy.act(state.view())?;
        let mut best_cost = self.score(state, &best)?;
        if best_cost <= self.config.threshold {
            self.accepted_times += 1;
            return Ok(best);
        }

        self.resampled_times += 1;
        let mut attempts = 0;
        while best_cost > self.config.threshold && attempts < self.config.max_attempts {
            let action = self.policy.act(state.view())?;
            let cost = self.score(state, &action)?;
            if cost < best_cost {
                best = action;
                best_cost = cost;
            }
            attempts += 1;
        }
        debug!(attempts, cost = best_cost, "resampled proposal");
        Ok(best)
    }

    /// `(resampled_times, accepted_times)`
    pub fn report(&self) -> (u64, u64) {
        (self.resampled_times, self.accepted_times)
    }

    pub fn reset_counts(&mut self) {
        self.accepted_times = 0;
        self.resampled_times = 0;
    }

    fn score(&self, state: &Array1<f64>, action: &Array1<f64>) -> Result<f64> {
        let cost = self.critic.cost(state.view(), action.view())?;
        if cost.is_nan() {
            return Err(ShieldError::Model("cost critic returned NaN".into()));
        }
        Ok(cost)
    }
}
