//! Projection of proposed actions onto the set of horizon-safe actions.
//!
//! For every safe polytope that currently contains the state, the proposed
//! action is tried in two tiers:
//!
//! 1. **Certify**: fix `u_0` to the proposal and look for any continuation
//!    `u_1 .. u_{H-1}` that keeps the linear model inside the polytope. If one
//!    exists the proposal is safe as-is (score 0).
//! 2. **Re-optimize**: free `u_0` and minimize `w ‖u‖² + ‖u_0 - proposal‖²`
//!    over the whole sequence. The score is `‖u_0 - proposal‖`.
//!
//! Across polytopes the candidate with the smallest score wins; ties go to
//! the polytope listed first.

use crate::config::SolverConfig;
use crate::dynamics::LocalDynamics;
use crate::horizon::{ConstraintSystem, HorizonConstraintBuilder};
use crate::region::SafeRegion;
use crate::solver::QuadraticProgram;
use crate::spaces::Box;
use crate::{ensure_len, Result, ShieldError};
use ndarray::{s, Array1, Array2, ArrayView1};
use tracing::debug;

/// Which tier produced a candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    /// The proposal itself was certified
    Certified,
    /// `u_0` was re-optimized
    Reoptimized,
}

/// A safe action sequence found inside one polytope.
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Position of the polytope in the safe region
    pub polytope: usize,
    /// First action to execute
    pub action: Array1<f64>,
    /// Full plan `[u_0; ...; u_{H-1}]`
    pub sequence: Array1<f64>,
    /// Distance from the proposal, `0` for certified proposals
    pub score: f64,
    pub tier: Tier,
}

impl Candidate {
    /// Split the stacked plan into per-step actions.
    pub fn steps(&self) -> Vec<Array1<f64>> {
        let u = self.action.len();
        self.sequence
            .exact_chunks(u)
            .into_iter()
            .map(|c| c.to_owned())
            .collect()
    }
}

/// Constraint system for one safe polytope that contains the current state.
#[derive(Clone, Debug)]
pub struct PolytopeSystem {
    pub polytope: usize,
    pub system: ConstraintSystem,
}

/// Two-tier safety QP over a fixed safe region and action box.
#[derive(Clone, Debug)]
pub struct SafetyQp {
    region: SafeRegion,
    bounds: Box,
    builder: HorizonConstraintBuilder,
    solver: SolverConfig,
}

impl SafetyQp {
    pub fn new(region: SafeRegion, bounds: Box, horizon: usize, solver: SolverConfig) -> Result<Self> {
        solver.validate()?;
        if bounds.dim() == 0 {
            return Err(ShieldError::Configuration("action space must not be empty".into()));
        }
        Ok(Self {
            region,
            bounds,
            builder: HorizonConstraintBuilder::new(horizon)?,
            solver,
        })
    }

    pub fn horizon(&self) -> usize {
        self.builder.horizon()
    }

    pub fn region(&self) -> &SafeRegion {
        &self.region
    }

    pub fn bounds(&self) -> &Box {
        &self.bounds
    }

    pub fn solver(&self) -> &SolverConfig {
        &self.solver
    }

    pub fn action_dim(&self) -> usize {
        self.bounds.dim()
    }

    /// Build the constraint system of every polytope containing `x0`.
    ///
    /// Polytopes that do not contain `x0` cannot certify anything from here
    /// and are skipped. Membership uses the same `feasibility_tol` that
    /// accepted the plan leading here.
    pub fn assemble(&self, x0: ArrayView1<f64>, dynamics: &LocalDynamics) -> Result<Vec<PolytopeSystem>> {
        if let Some(dim) = self.region.dim() {
            ensure_len("state", dim, x0.len())?;
        }
        dynamics.check_dims(x0.len(), self.action_dim())?;

        let mut systems = Vec::new();
        for (index, poly) in self.region.containing(x0, self.solver.feasibility_tol) {
            let horizon = self.builder.build(poly, dynamics)?;
            let system = self.builder.assemble(&horizon, x0, &self.bounds)?;
            systems.push(PolytopeSystem {
                polytope: index,
                system,
            });
        }
        if systems.is_empty() {
            debug!("state lies outside every safe polytope");
        }
        Ok(systems)
    }

    /// Tier 1 for one polytope: is there a safe continuation after `proposal`?
    pub fn certify_with(&self, entry: &PolytopeSystem, proposal: ArrayView1<f64>) -> Option<Candidate> {
        let fixed = entry.system.fix_first_action(proposal);
        let n = fixed.num_vars();
        let qp = QuadraticProgram::min_norm(fixed.matrix.clone(), fixed.upper_bounds());
        let solution = qp.solve(&self.solver);
        let status = solution.status;
        let rest = solution.into_optimal().filter(|x| {
            n == 0 || fixed.max_violation(x.view()) <= self.solver.feasibility_tol
        });
        debug!(polytope = entry.polytope, %status, "tier-1 certification");

        let rest = rest?;
        let mut sequence = Array1::zeros(n + proposal.len());
        sequence.slice_mut(s![..proposal.len()]).assign(&proposal);
        sequence.slice_mut(s![proposal.len()..]).assign(&rest);
        Some(Candidate {
            polytope: entry.polytope,
            action: proposal.to_owned(),
            sequence,
            score: 0.0,
            tier: Tier::Certified,
        })
    }

    /// Tier 2 for one polytope: closest safe first action.
    pub fn reoptimize_with(&self, entry: &PolytopeSystem, proposal: ArrayView1<f64>) -> Option<Candidate> {
        let u = proposal.len();
        let n = entry.system.num_vars();
        let weight = self.solver.regularization;

        // w‖u‖² + ‖u0 - a‖²  ==  ½ uᵀ Q u + qᵀ u + const
        let mut hessian = Array2::eye(n) * (2.0 * weight);
        let mut linear = Array1::zeros(n);
        for i in 0..u {
            hessian[[i, i]] += 2.0;
            linear[i] = -2.0 * proposal[i];
        }
        let qp = QuadraticProgram::new(
            hessian,
            linear,
            entry.system.matrix.clone(),
            entry.system.upper_bounds(),
        );
        let solution = qp.solve(&self.solver);
        let status = solution.status;
        let sequence = solution
            .into_optimal()
            .filter(|x| entry.system.max_violation(x.view()) <= self.solver.feasibility_tol);
        debug!(polytope = entry.polytope, %status, "tier-2 re-optimization");

        let sequence = sequence?;
        let action = sequence.slice(s![..u]).to_owned();
        let score = (&action - &proposal).mapv(|d| d * d).sum().sqrt();
        Some(Candidate {
            polytope: entry.polytope,
            action,
            sequence,
            score,
            tier: Tier::Reoptimized,
        })
    }

    /// Tier 1 across polytopes; the first certifying polytope wins.
    pub fn certify(&self, systems: &[PolytopeSystem], proposal: ArrayView1<f64>) -> Option<Candidate> {
        select(self.evaluate(systems, |entry| self.certify_with(entry, proposal)))
    }

    /// Tier 2 across polytopes, keeping the closest candidate.
    pub fn reoptimize(&self, systems: &[PolytopeSystem], proposal: ArrayView1<f64>) -> Option<Candidate> {
        select(self.evaluate(systems, |entry| self.reoptimize_with(entry, proposal)))
    }

    /// Full two-tier procedure: per polytope, tier 1 then tier 2 on failure.
    ///
    /// `Ok(None)` means no polytope produced a candidate and the caller
    /// should fall back to a backup controller.
    pub fn solve(
        &self,
        x0: ArrayView1<f64>,
        proposal: ArrayView1<f64>,
        dynamics: &LocalDynamics,
    ) -> Result<Option<Candidate>> {
        ensure_len("proposed action", self.action_dim(), proposal.len())?;
        let systems = self.assemble(x0, dynamics)?;
        Ok(select(self.evaluate(&systems, |entry| {
            self.certify_with(entry, proposal)
                .or_else(|| self.reoptimize_with(entry, proposal))
        })))
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate<F>(&self, systems: &[PolytopeSystem], f: F) -> Vec<Option<Candidate>>
    where
        F: Fn(&PolytopeSystem) -> Option<Candidate>,
    {
        systems.iter().map(f).collect()
    }

    #[cfg(feature = "parallel")]
    fn evaluate<F>(&self, systems: &[PolytopeSystem], f: F) -> Vec<Option<Candidate>>
    where
        F: Fn(&PolytopeSystem) -> Option<Candidate> + Sync + Send,
    {
        use rayon::prelude::*;
        systems.par_iter().map(f).collect()
    }
}

/// Minimum score, first in enumeration order on ties.
fn select(candidates: Vec<Option<Candidate>>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in candidates.into_iter().flatten() {
        if best.as_ref().map_or(true, |b| candidate.score < b.score) {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Polytope;
    use ndarray::array;

    fn wall_dynamics() -> LocalDynamics {
        LocalDynamics::exact(
            array![[1.0, 0.0], [0.0, 1.0]],
            array![[1.0], [0.0]],
            array![0.0, 0.0],
        )
        .unwrap()
    }

    fn wall_qp(horizon: usize) -> SafetyQp {
        let region =
            SafeRegion::new(vec![Polytope::new(array![[1.0, 0.0]], array![-5.0]).unwrap()]).unwrap();
        SafetyQp::new(region, Box::uniform(1, -10.0, 10.0), horizon, SolverConfig::default()).unwrap()
    }

    #[test]
    fn test_unsafe_proposal_is_projected_to_boundary() {
        let qp = wall_qp(2);
        let x0 = array![4.0, 0.0];
        let proposal = array![10.0];
        let systems = qp.assemble(x0.view(), &wall_dynamics()).unwrap();
        assert_eq!(systems.len(), 1);

        assert!(qp.certify(&systems, proposal.view()).is_none());

        let candidate = qp.reoptimize(&systems, proposal.view()).unwrap();
        assert_eq!(candidate.tier, Tier::Reoptimized);
        assert!(candidate.action[0] <= 1.0 + 1e-6);
        assert!((candidate.action[0] - 1.0).abs() < 1e-6);
        assert!(candidate.score > 0.0);
        assert!((candidate.score - 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_safe_proposal_is_certified_unchanged() {
        let qp = wall_qp(2);
        let proposal = array![0.5];
        let candidate = qp
            .solve(array![4.0, 0.0].view(), proposal.view(), &wall_dynamics())
            .unwrap()
            .unwrap();
        assert_eq!(candidate.tier, Tier::Certified);
        assert_eq!(candidate.action, proposal);
        assert_eq!(candidate.score, 0.0);
        assert_eq!(candidate.sequence.len(), 2);
    }

    #[test]
    fn test_out_of_bounds_proposal_is_not_certified() {
        let qp = wall_qp(1);
        let systems = qp.assemble(array![0.0, 0.0].view(), &wall_dynamics()).unwrap();
        assert!(qp.certify(&systems, array![11.0].view()).is_none());
    }

    #[test]
    fn test_state_outside_region_yields_nothing() {
        let qp = wall_qp(2);
        let result = qp
            .solve(array![6.0, 0.0].view(), array![0.0].view(), &wall_dynamics())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_dimension_mismatch() {
        let qp = wall_qp(2);
        assert!(matches!(
            qp.solve(array![4.0].view(), array![0.0].view(), &wall_dynamics()),
            Err(ShieldError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            qp.solve(array![4.0, 0.0].view(), array![0.0, 1.0].view(), &wall_dynamics()),
            Err(ShieldError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_selection_prefers_smaller_score_then_first() {
        let mk = |polytope, score| {
            Some(Candidate {
                polytope,
                action: array![0.0],
                sequence: array![0.0],
                score,
                tier: Tier::Reoptimized,
            })
        };
        let best = select(vec![mk(0, 2.0), None, mk(2, 1.0), mk(3, 1.0)]).unwrap();
        assert_eq!(best.polytope, 2);
        assert!(select(vec![None, None]).is_none());
    }

    #[test]
    fn test_closest_polytope_wins() {
        // Two overlapping walls; the looser one allows a bigger first step.
        let tight = Polytope::new(array![[1.0, 0.0]], array![-4.5]).unwrap();
        let loose = Polytope::new(array![[1.0, 0.0]], array![-6.0]).unwrap();
        let region = SafeRegion::new(vec![tight, loose]).unwrap();
        let qp = SafetyQp::new(region, Box::uniform(1, -10.0, 10.0), 1, SolverConfig::default())
            .unwrap();

        let candidate = qp
            .solve(array![4.0, 0.0].view(), array![5.0].view(), &wall_dynamics())
            .unwrap()
            .unwrap();
        assert_eq!(candidate.polytope, 1);
        assert!((candidate.action[0] - 2.0).abs() < 1e-6);
    }
}
