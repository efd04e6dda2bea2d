//! Environment wrappers.

use super::{ControlEnv, StepResult};
use crate::region::{Polytope, SafeRegion};
use crate::spaces::Box;
use crate::Result;
use ndarray::Array1;

/// Wrapper that tracks episode statistics.
///
/// Totals are kept for the current episode and reset on `reset`.
pub struct EpisodeStats<E: ControlEnv> {
    env: E,
    episode_return: f64,
    episode_cost: f64,
    episode_length: u32,
    violations: u32,
}

impl<E: ControlEnv> EpisodeStats<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            episode_return: 0.0,
            episode_cost: 0.0,
            episode_length: 0,
            violations: 0,
        }
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn episode_return(&self) -> f64 {
        self.episode_return
    }

    pub fn episode_cost(&self) -> f64 {
        self.episode_cost
    }

    pub fn episode_length(&self) -> u32 {
        self.episode_length
    }

    /// Steps that ended in an unsafe state
    pub fn violations(&self) -> u32 {
        self.violations
    }
}

impl<E: ControlEnv> ControlEnv for EpisodeStats<E> {
    fn observation_space(&self) -> Box {
        self.env.observation_space()
    }

    fn action_space(&self) -> Box {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> Array1<f64> {
        self.episode_return = 0.0;
        self.episode_cost = 0.0;
        self.episode_length = 0;
        self.violations = 0;
        self.env.reset(seed)
    }

    fn step(&mut self, action: &Array1<f64>) -> Result<StepResult> {
        let result = self.env.step(action)?;
        self.episode_return += result.reward;
        self.episode_cost += result.cost;
        self.episode_length += 1;
        if self.env.is_unsafe(&result.observation) {
            self.violations += 1;
        }
        Ok(result)
    }

    fn safe_region(&self) -> SafeRegion {
        self.env.safe_region()
    }

    fn unsafe_polytopes(&self) -> Vec<Polytope> {
        self.env.unsafe_polytopes()
    }

    fn is_unsafe(&self, state: &Array1<f64>) -> bool {
        self.env.is_unsafe(state)
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_len;
    use ndarray::array;

    /// `x' = x + u` on the line, safe while `x <= 1`.
    struct Line {
        x: f64,
    }

    impl ControlEnv for Line {
        fn observation_space(&self) -> Box {
            Box::unbounded(1)
        }

        fn action_space(&self) -> Box {
            Box::uniform(1, -1.0, 1.0)
        }

        fn reset(&mut self, _seed: Option<u64>) -> Array1<f64> {
            self.x = 0.0;
            array![self.x]
        }

        fn step(&mut self, action: &Array1<f64>) -> Result<StepResult> {
            ensure_len("action", 1, action.len())?;
            self.x += action[0];
            let unsafe_now = self.x > 1.0;
            Ok(StepResult {
                observation: array![self.x],
                reward: action[0],
                terminated: false,
                truncated: false,
                cost: if unsafe_now { 1.0 } else { 0.0 },
            })
        }

        fn safe_region(&self) -> SafeRegion {
            SafeRegion::from_pairs(vec![(array![[1.0]], array![-1.0])]).unwrap()
        }

        fn unsafe_polytopes(&self) -> Vec<Polytope> {
            vec![Polytope::new(array![[-1.0]], array![1.0]).unwrap()]
        }
    }

    #[test]
    fn test_episode_stats() {
        let mut env = EpisodeStats::new(Line { x: 0.0 });
        env.reset(None);
        for _ in 0..3 {
            env.step(&array![0.75]).unwrap();
        }
        assert_eq!(env.episode_length(), 3);
        assert!((env.episode_return() - 2.25).abs() < 1e-12);
        assert_eq!(env.violations(), 2);
        assert_eq!(env.episode_cost(), 2.0);
        assert!(env.step(&array![0.0, 0.0]).is_err());

        env.reset(None);
        assert_eq!(env.violations(), 0);
        assert_eq!(env.episode_length(), 0);
    }
}
