//! Cart driving towards a wall.

use ndarray::{array, Array1};
use polyshield::dynamics::{AffineModel, LocalDynamics};
use polyshield::env::{ControlEnv, StepResult};
use polyshield::region::{Polytope, SafeRegion};
use polyshield::spaces::Box as BoxSpace;
use polyshield::{Result, ShieldError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Clone, Debug)]
pub struct WallCartConfig {
    pub dt: f64,
    /// Position of the wall; the cart is unsafe past it
    pub wall: f64,
    pub max_force: f64,
    /// Linear velocity damping
    pub friction: f64,
    pub max_steps: u32,
}

impl Default for WallCartConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            wall: 5.0,
            max_force: 1.0,
            friction: 0.5,
            max_steps: 200,
        }
    }
}

/// Cart on a track ending in a wall.
///
/// Observation: [position, velocity]
/// Action: force in `[-max_force, max_force]`
///
/// The reward is the velocity, so an unshielded greedy policy drives into
/// the wall. Crossing it terminates the episode.
pub struct WallCart {
    config: WallCartConfig,
    dynamics: LocalDynamics,
    safe: SafeRegion,
    outside: Vec<Polytope>,
    state: Array1<f64>,
    steps: u32,
    rng: StdRng,
}

impl WallCart {
    pub fn new(config: WallCartConfig, seed: u64) -> Result<Self> {
        let valid = config.dt > 0.0
            && config.max_force > 0.0
            && config.friction >= 0.0
            && config.wall.is_finite();
        if !valid {
            return Err(ShieldError::Configuration(format!(
                "invalid wall cart config: {config:?}"
            )));
        }
        let dt = config.dt;
        let dynamics = LocalDynamics::exact(
            array![[1.0, dt], [0.0, 1.0 - config.friction * dt]],
            array![[0.0], [dt]],
            array![0.0, 0.0],
        )?;
        let safe = SafeRegion::from_pairs(vec![(array![[1.0, 0.0]], array![-config.wall])])?;
        let outside = vec![Polytope::new(array![[-1.0, 0.0]], array![config.wall])?];
        Ok(Self {
            config,
            dynamics,
            safe,
            outside,
            state: Array1::zeros(2),
            steps: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn model(&self) -> AffineModel {
        AffineModel::new(self.dynamics.clone())
    }

    pub fn wall(&self) -> f64 {
        self.config.wall
    }
}

impl ControlEnv for WallCart {
    fn observation_space(&self) -> BoxSpace {
        BoxSpace::unbounded(2)
    }

    fn action_space(&self) -> BoxSpace {
        BoxSpace::uniform(1, -self.config.max_force, self.config.max_force)
    }

    fn reset(&mut self, seed: Option<u64>) -> Array1<f64> {
        if let Some(s) = seed {
            self.rng = StdRng::seed_from_u64(s);
        }
        self.state = array![self.rng.gen_range(-1.0..=0.0), 0.0];
        self.steps = 0;
        self.state.clone()
    }

    fn step(&mut self, action: &Array1<f64>) -> Result<StepResult> {
        self.dynamics.check_dims(2, action.len())?;
        let force = self.action_space().clip(action);
        self.state = self.dynamics.step(self.state.view(), force.view());
        self.steps += 1;

        let crashed = self.state[0] > self.config.wall;
        Ok(StepResult {
            observation: self.state.clone(),
            reward: self.state[1],
            terminated: crashed,
            truncated: self.steps >= self.config.max_steps,
            cost: if crashed { 1.0 } else { 0.0 },
        })
    }

    fn safe_region(&self) -> SafeRegion {
        self.safe.clone()
    }

    fn unsafe_polytopes(&self) -> Vec<Polytope> {
        self.outside.clone()
    }

    fn render(&self) -> Option<String> {
        Some(format!(
            "x={:+.3} v={:+.3} wall={}",
            self.state[0], self.state[1], self.config.wall
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyshield::config::ShieldConfig;
    use polyshield::policy::FnPolicy;
    use ndarray::ArrayView1;
    use polyshield::shield::{Outcome, Shield};

    #[test]
    fn test_unshielded_greedy_policy_crashes() {
        let mut env = WallCart::new(WallCartConfig::default(), 0).unwrap();
        env.reset(Some(0));
        let crashed = (0..200).any(|_| env.step(&array![1.0]).unwrap().terminated);
        assert!(crashed);
    }

    #[test]
    fn test_shield_intervenes_near_wall() {
        let mut env = WallCart::new(WallCartConfig::default(), 0).unwrap();
        let greedy = FnPolicy::new(|_s: ArrayView1<f64>| array![1.0]);
        let mut shield = Shield::new(
            greedy,
            env.model(),
            env.safe_region(),
            env.unsafe_polytopes(),
            env.action_space(),
            ShieldConfig::default().with_horizon(10),
        )
        .unwrap();

        let mut state = env.reset(Some(0));
        let mut outcomes = Vec::new();
        for _ in 0..100 {
            let decision = shield.decide_tagged(&state).unwrap();
            assert!(decision.action[0].abs() <= 1.0 + 1e-6);
            outcomes.push(decision.outcome);
            let result = env.step(&decision.action).unwrap();
            let done = result.done();
            state = result.observation;
            if done {
                break;
            }
        }
        assert_eq!(outcomes[0], Outcome::Agent);
        assert!(outcomes.iter().any(|o| *o != Outcome::Agent));
        let stats = shield.stats();
        assert_eq!(stats.decisions() as usize, outcomes.len());
    }
}
