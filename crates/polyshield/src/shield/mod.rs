//! Safety shielding for untrusted policies.
//!
//! [`Shield`] wraps a policy and, for every state:
//! 1. asks the policy for a proposal,
//! 2. checks whether the proposal can be completed into a safe `H`-step plan
//!    in some safe polytope (cheap, first action fixed),
//! 3. otherwise projects onto the closest safe first action,
//! 4. and if no safe polytope admits a plan, hands over to the
//!    [`BackupController`].
//!
//! [`CostCriticShield`] is a best-effort alternative for policies that come
//! with a learned cost critic instead of a model.

mod critic;
mod state;

pub use critic::{CostCritic, CostCriticShield, CriticConfig, FnCritic};
pub use state::{ShieldReport, ShieldState};

use crate::backup::BackupController;
use crate::config::ShieldConfig;
use crate::dynamics::{LocalDynamics, LocalModelProvider};
use crate::policy::Policy;
use crate::projection::SafetyQp;
use crate::region::{Polytope, SafeRegion};
use crate::spaces::Box;
use crate::utils::{allclose, concat};
use crate::{ensure_len, Result, ShieldError};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// How a decision was reached
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The proposal was certified and returned unchanged
    Agent,
    /// The proposal was projected onto a safe action
    Shielded,
    /// No safe projection existed; the backup controller chose the action
    Backup,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Agent => "agent",
            Outcome::Shielded => "shielded",
            Outcome::Backup => "backup",
        };
        f.write_str(name)
    }
}

/// An action together with how it was chosen.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub action: Array1<f64>,
    pub outcome: Outcome,
}

#[derive(Clone, Debug)]
struct CachedDecision {
    state: Array1<f64>,
    decision: Decision,
}

/// Projection shield around an untrusted policy.
pub struct Shield<P, M> {
    policy: P,
    model: M,
    projection: SafetyQp,
    backup: BackupController,
    config: ShieldConfig,
    state_dim: usize,
    counters: ShieldState,
    cache: Option<CachedDecision>,
}

impl<P: Policy, M: LocalModelProvider> Shield<P, M> {
    /// Create a shield.
    ///
    /// `unsafe_polytopes` describe the complement of `safe_region` and steer
    /// the backup controller. The state dimension is taken from the regions.
    pub fn new(
        policy: P,
        model: M,
        safe_region: SafeRegion,
        unsafe_polytopes: Vec<Polytope>,
        bounds: Box,
        config: ShieldConfig,
    ) -> Result<Self> {
        config.validate()?;
        let state_dim = safe_region
            .dim()
            .or_else(|| unsafe_polytopes.first().map(Polytope::dim))
            .ok_or_else(|| {
                ShieldError::Configuration("shield needs at least one safe or unsafe polytope".into())
            })?;
        if let Some(p) = unsafe_polytopes.first() {
            ensure_len("unsafe polytope dimension", state_dim, p.dim())?;
        }

        let backup = BackupController::new(
            unsafe_polytopes,
            bounds.clone(),
            config.horizon,
            config.solver.clone(),
        )?;
        let projection = SafetyQp::new(safe_region, bounds, config.horizon, config.solver.clone())?;

        Ok(Self {
            policy,
            model,
            projection,
            backup,
            config,
            state_dim,
            counters: ShieldState::default(),
            cache: None,
        })
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn action_dim(&self) -> usize {
        self.projection.action_dim()
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Choose the action to execute in `state`.
    pub fn decide(&mut self, state: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.decide_tagged(state)?.action)
    }

    /// Like [`Shield::decide`], also reporting how the action was chosen.
    pub fn decide_tagged(&mut self, state: &Array1<f64>) -> Result<Decision> {
        let start = Instant::now();
        ensure_len("state", self.state_dim, state.len())?;

        if let Some(decision) = self.cached(state.view()) {
            self.counters.record(decision.outcome, start.elapsed());
            return Ok(decision);
        }

        let proposal = self.policy.act(state.view())?;
        ensure_len("proposed action", self.action_dim(), proposal.len())?;

        let decision = self.resolve(state.view(), proposal)?;
        self.remember(state, &decision);
        self.counters.record(decision.outcome, start.elapsed());
        Ok(decision)
    }

    /// Whether executing `action` in `state` would be overridden.
    ///
    /// Runs the full procedure and caches the result, so a following
    /// [`Shield::decide`] on the same state returns it without re-solving.
    /// Counters are not touched.
    pub fn is_unsafe(&mut self, state: &Array1<f64>, action: &Array1<f64>) -> Result<bool> {
        ensure_len("state", self.state_dim, state.len())?;
        ensure_len("action", self.action_dim(), action.len())?;
        let decision = self.resolve(state.view(), action.clone())?;
        let overridden = decision.outcome != Outcome::Agent;
        self.remember(state, &decision);
        Ok(overridden)
    }

    /// `(shield_times, agent_times, total_time)`
    pub fn report(&self) -> (u64, u64, f64) {
        let r = self.counters.report();
        (r.shield_times, r.agent_times, r.total_time)
    }

    /// All counters, including backup activations.
    pub fn stats(&self) -> ShieldReport {
        self.counters.report()
    }

    /// Zero all counters. Call once per episode or reporting window.
    pub fn reset_counts(&mut self) {
        self.counters.reset();
    }

    /// Forget the cached decision.
    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    fn cached(&self, state: ArrayView1<f64>) -> Option<Decision> {
        let hit = self.cache.as_ref().filter(|c| {
            allclose(state, c.state.view(), self.config.cache_rtol, self.config.cache_atol)
        })?;
        debug!(outcome = %hit.decision.outcome, "reusing cached decision");
        Some(hit.decision.clone())
    }

    fn remember(&mut self, state: &Array1<f64>, decision: &Decision) {
        self.cache = Some(CachedDecision {
            state: state.clone(),
            decision: decision.clone(),
        });
    }

    fn linearize(&self, state: ArrayView1<f64>, action: ArrayView1<f64>) -> Result<LocalDynamics> {
        let point = concat(state, action);
        let dynamics = self.model.local_dynamics(point.view(), self.state_dim)?;
        dynamics.check_dims(self.state_dim, self.action_dim())?;
        Ok(dynamics)
    }

    fn resolve(&self, state: ArrayView1<f64>, proposal: Array1<f64>) -> Result<Decision> {
        let dynamics = self.linearize(state, proposal.view())?;
        let systems = self.projection.assemble(state, &dynamics)?;

        if self.projection.certify(&systems, proposal.view()).is_some() {
            return Ok(Decision {
                action: proposal,
                outcome: Outcome::Agent,
            });
        }

        if let Some(candidate) = self.projection.reoptimize(&systems, proposal.view()) {
            debug!(
                polytope = candidate.polytope,
                score = candidate.score,
                "proposal projected"
            );
            return Ok(Decision {
                action: candidate.action,
                outcome: Outcome::Shielded,
            });
        }

        info!(
            candidates = systems.len(),
            "no safe projection, using backup controller"
        );
        let zero = Array1::zeros(self.action_dim());
        let backup_dynamics = self.linearize(state, zero.view())?;
        let action = self.backup.select(state, &backup_dynamics)?;
        Ok(Decision {
            action,
            outcome: Outcome::Backup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldConfig;
    use crate::dynamics::AffineModel;
    use crate::policy::FnPolicy;
    use ndarray::array;
    use std::cell::Cell;
    use std::rc::Rc;

    fn wall_model(drift: f64) -> AffineModel {
        AffineModel::new(
            LocalDynamics::exact(
                array![[1.0, 0.0], [0.0, 1.0]],
                array![[1.0], [0.0]],
                array![drift, 0.0],
            )
            .unwrap(),
        )
    }

    fn wall_region() -> SafeRegion {
        SafeRegion::new(vec![Polytope::new(array![[1.0, 0.0]], array![-5.0]).unwrap()]).unwrap()
    }

    fn beyond_wall() -> Vec<Polytope> {
        vec![Polytope::new(array![[-1.0, 0.0]], array![5.0]).unwrap()]
    }

    fn constant(value: f64) -> FnPolicy<impl FnMut(ArrayView1<f64>) -> Array1<f64>> {
        FnPolicy::new(move |_s: ArrayView1<f64>| array![value])
    }

    #[test]
    fn test_outcomes_and_counters() {
        let config = ShieldConfig::default().with_horizon(2);
        let mut shield = Shield::new(
            constant(10.0),
            wall_model(0.0),
            wall_region(),
            beyond_wall(),
            Box::uniform(1, -10.0, 10.0),
            config,
        )
        .unwrap();

        let decision = shield.decide_tagged(&array![4.0, 0.0]).unwrap();
        assert_eq!(decision.outcome, Outcome::Shielded);
        assert!((decision.action[0] - 1.0).abs() < 1e-6);

        let decision = shield.decide_tagged(&array![-20.0, 0.0]).unwrap();
        assert_eq!(decision.outcome, Outcome::Agent);
        assert_eq!(decision.action, array![10.0]);

        let (shielded, agent, total_time) = shield.report();
        assert_eq!((shielded, agent), (1, 1));
        assert!(total_time >= 0.0);

        shield.reset_counts();
        assert_eq!(shield.report().0, 0);
        assert_eq!(shield.report().1, 0);
        assert_eq!(shield.report().2, 0.0);
    }

    #[test]
    fn test_cached_decision_skips_policy() {
        let calls = Rc::new(Cell::new(0usize));
        let seen = calls.clone();
        let policy = FnPolicy::new(move |_s: ArrayView1<f64>| {
            seen.set(seen.get() + 1);
            array![seen.get() as f64 * 0.1]
        });
        let mut shield = Shield::new(
            policy,
            wall_model(0.0),
            wall_region(),
            beyond_wall(),
            Box::uniform(1, -10.0, 10.0),
            ShieldConfig::default().with_horizon(2),
        )
        .unwrap();

        let state = array![0.0, 0.0];
        let first = shield.decide(&state).unwrap();
        let second = shield.decide(&state).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert_eq!(shield.stats().agent_times, 2);

        shield.decide(&array![0.5, 0.0]).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_is_unsafe_then_decide_reuses_solution() {
        let calls = Rc::new(Cell::new(0usize));
        let seen = calls.clone();
        let policy = FnPolicy::new(move |_s: ArrayView1<f64>| {
            seen.set(seen.get() + 1);
            array![10.0]
        });
        let mut shield = Shield::new(
            policy,
            wall_model(0.0),
            wall_region(),
            beyond_wall(),
            Box::uniform(1, -10.0, 10.0),
            ShieldConfig::default().with_horizon(2),
        )
        .unwrap();

        let state = array![4.0, 0.0];
        assert!(shield.is_unsafe(&state, &array![10.0]).unwrap());
        assert_eq!(shield.stats().decisions(), 0);

        let decision = shield.decide_tagged(&state).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(decision.outcome, Outcome::Shielded);
        assert!(!shield.is_unsafe(&state, &array![0.5]).unwrap());
    }

    #[test]
    fn test_backup_when_no_projection_exists() {
        let mut shield = Shield::new(
            constant(1.0),
            wall_model(2.0),
            wall_region(),
            beyond_wall(),
            Box::uniform(1, -1.0, 1.0),
            ShieldConfig::default().with_horizon(2),
        )
        .unwrap();

        let decision = shield.decide_tagged(&array![4.0, 0.0]).unwrap();
        assert_eq!(decision.outcome, Outcome::Backup);
        assert_eq!(decision.action, array![-1.0]);
        let stats = shield.stats();
        assert_eq!((stats.shield_times, stats.backup_times, stats.agent_times), (1, 1, 0));
    }

    #[test]
    fn test_backup_retreats_from_wall_boundary() {
        let mut shield = Shield::new(
            constant(1.0),
            wall_model(2.0),
            wall_region(),
            beyond_wall(),
            Box::uniform(1, -1.0, 1.0),
            ShieldConfig::default().with_horizon(2),
        )
        .unwrap();

        for x in [5.0, 5.5] {
            let decision = shield.decide_tagged(&array![x, 0.0]).unwrap();
            assert_eq!(decision.outcome, Outcome::Backup);
            assert_eq!(decision.action, array![-1.0], "x = {x}");
        }
    }

    #[test]
    fn test_degenerate_bounds_propagate_configuration_error() {
        let mut shield = Shield::new(
            constant(0.0),
            wall_model(0.0),
            wall_region(),
            beyond_wall(),
            Box::new(array![1.0], array![-1.0]),
            ShieldConfig::default().with_horizon(2),
        )
        .unwrap();

        assert!(matches!(
            shield.decide(&array![0.0, 0.0]),
            Err(ShieldError::Configuration(_))
        ));
        assert_eq!(shield.stats().decisions(), 0);
    }

    #[test]
    fn test_dimension_mismatch_fails_fast() {
        let mut shield = Shield::new(
            constant(0.0),
            wall_model(0.0),
            wall_region(),
            beyond_wall(),
            Box::uniform(1, -1.0, 1.0),
            ShieldConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            shield.decide(&array![0.0, 0.0, 0.0]),
            Err(ShieldError::DimensionMismatch { .. })
        ));

        let mut wide = Shield::new(
            FnPolicy::new(|_s: ArrayView1<f64>| array![0.0, 0.0]),
            wall_model(0.0),
            wall_region(),
            beyond_wall(),
            Box::uniform(1, -1.0, 1.0),
            ShieldConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            wide.decide(&array![0.0, 0.0]),
            Err(ShieldError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let result = Shield::new(
            constant(0.0),
            wall_model(0.0),
            wall_region(),
            beyond_wall(),
            Box::uniform(1, -1.0, 1.0),
            ShieldConfig::default().with_horizon(0),
        );
        assert!(matches!(result, Err(ShieldError::InvalidHorizon(0))));
    }
}
