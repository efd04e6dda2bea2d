//! Core environment trait definitions.

use crate::region::{Polytope, SafeRegion};
use crate::spaces::Box;
use crate::Result;
use ndarray::Array1;

/// Result from a single environment step
#[derive(Clone, Debug, PartialEq)]
pub struct StepResult {
    /// State after the step
    pub observation: Array1<f64>,
    pub reward: f64,
    /// Episode ended (failure, goal reached)
    pub terminated: bool,
    /// Episode cut short by a time limit
    pub truncated: bool,
    /// Safety cost of the transition, `1.0` when the new state is unsafe
    pub cost: f64,
}

impl StepResult {
    /// Check if episode is done (terminated or truncated)
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Fully observed continuous-control environment.
///
/// Environments declare their safe region and its complement so a shield
/// can be built directly from them.
///
/// ```rust,ignore
/// let mut env = WallCart::new(WallCartConfig::default());
/// let mut shield = Shield::new(
///     RandomPolicy::new(env.action_space(), 0),
///     env.model(),
///     env.safe_region(),
///     env.unsafe_polytopes(),
///     env.action_space(),
///     ShieldConfig::default(),
/// )?;
/// let mut state = env.reset(Some(0));
/// let result = env.step(&shield.decide(&state)?)?;
/// ```
pub trait ControlEnv {
    fn observation_space(&self) -> Box;

    fn action_space(&self) -> Box;

    /// Reset to an initial state
    fn reset(&mut self, seed: Option<u64>) -> Array1<f64>;

    /// Advance one step.
    ///
    /// Fails with `DimensionMismatch` when `action` has the wrong length.
    fn step(&mut self, action: &Array1<f64>) -> Result<StepResult>;

    fn safe_region(&self) -> SafeRegion;

    /// Polytopes covering the unsafe part of the state space
    fn unsafe_polytopes(&self) -> Vec<Polytope>;

    fn is_unsafe(&self, state: &Array1<f64>) -> bool {
        !self.safe_region().contains(state.view())
    }

    /// Optional: Render the current state as text
    fn render(&self) -> Option<String> {
        None
    }
}

impl<E: ControlEnv + ?Sized> ControlEnv for std::boxed::Box<E> {
    fn observation_space(&self) -> Box {
        (**self).observation_space()
    }

    fn action_space(&self) -> Box {
        (**self).action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> Array1<f64> {
        (**self).reset(seed)
    }

    fn step(&mut self, action: &Array1<f64>) -> Result<StepResult> {
        (**self).step(action)
    }

    fn safe_region(&self) -> SafeRegion {
        (**self).safe_region()
    }

    fn unsafe_polytopes(&self) -> Vec<Polytope> {
        (**self).unsafe_polytopes()
    }

    fn is_unsafe(&self, state: &Array1<f64>) -> bool {
        (**self).is_unsafe(state)
    }

    fn render(&self) -> Option<String> {
        (**self).render()
    }
}
