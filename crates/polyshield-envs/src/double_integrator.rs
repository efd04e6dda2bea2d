//! Double integrator kept inside a position/velocity box.

use ndarray::{array, Array1};
use polyshield::dynamics::{AffineModel, LocalDynamics};
use polyshield::env::{ControlEnv, StepResult};
use polyshield::region::{Polytope, SafeRegion};
use polyshield::spaces::Box as BoxSpace;
use polyshield::{Result, ShieldError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

#[derive(Clone, Debug)]
pub struct DoubleIntegratorConfig {
    pub dt: f64,
    pub position_limit: f64,
    pub velocity_limit: f64,
    pub max_force: f64,
    /// Bound on the uniform disturbance added to each state dimension
    pub disturbance: f64,
    pub max_steps: u32,
}

impl Default for DoubleIntegratorConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            position_limit: 1.0,
            velocity_limit: 1.0,
            max_force: 1.0,
            disturbance: 0.0,
            max_steps: 200,
        }
    }
}

/// Point mass on a line.
///
/// Observation: [position, velocity]
/// Action: force in `[-max_force, max_force]`
///
/// The state is safe inside `|position| <= position_limit` and
/// `|velocity| <= velocity_limit`. The reward pulls the mass to the origin.
pub struct DoubleIntegrator {
    config: DoubleIntegratorConfig,
    dynamics: LocalDynamics,
    safe: SafeRegion,
    outside: Vec<Polytope>,
    state: Array1<f64>,
    steps: u32,
    rng: StdRng,
}

impl DoubleIntegrator {
    pub fn new(config: DoubleIntegratorConfig, seed: u64) -> Result<Self> {
        let valid = config.dt > 0.0
            && config.max_force > 0.0
            && config.disturbance >= 0.0
            && config.position_limit > 0.0
            && config.velocity_limit > 0.0;
        if !valid {
            return Err(ShieldError::Configuration(format!(
                "invalid double integrator config: {config:?}"
            )));
        }
        let dt = config.dt;
        let dynamics = LocalDynamics::new(
            array![[1.0, dt], [0.0, 1.0]],
            array![[0.5 * dt * dt], [dt]],
            array![0.0, 0.0],
            Array1::from_elem(2, config.disturbance),
        )?;

        let limits = array![config.position_limit, config.velocity_limit];
        let safe = SafeRegion::new(vec![Polytope::from_bounds(&-&limits, &limits)?])?;
        let (p, v) = (config.position_limit, config.velocity_limit);
        let outside = vec![
            Polytope::new(array![[-1.0, 0.0]], array![p])?,
            Polytope::new(array![[1.0, 0.0]], array![p])?,
            Polytope::new(array![[0.0, -1.0]], array![v])?,
            Polytope::new(array![[0.0, 1.0]], array![v])?,
        ];

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

    /// Exact affine model of the dynamics, with the disturbance as its
    /// error radius.
    pub fn model(&self) -> AffineModel {
        AffineModel::new(self.dynamics.clone())
    }

    pub fn state(&self) -> &Array1<f64> {
        &self.state
    }
}

impl ControlEnv for DoubleIntegrator {
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
        let p = 0.5 * self.config.position_limit;
        let v = 0.5 * self.config.velocity_limit;
        self.state = array![self.rng.gen_range(-p..=p), self.rng.gen_range(-v..=v)];
        self.steps = 0;
        self.state.clone()
    }

    fn step(&mut self, action: &Array1<f64>) -> Result<StepResult> {
        self.dynamics.check_dims(2, action.len())?;
        let force = self.action_space().clip(action);
        let mut next = self.dynamics.step(self.state.view(), force.view());
        if self.config.disturbance > 0.0 {
            let noise = Uniform::new_inclusive(-self.config.disturbance, self.config.disturbance);
            next.mapv_inplace(|x| x + noise.sample(&mut self.rng));
        }
        self.state = next;
        self.steps += 1;

        let cost = if self.is_unsafe(&self.state) { 1.0 } else { 0.0 };
        Ok(StepResult {
            observation: self.state.clone(),
            reward: -self.state[0] * self.state[0],
            terminated: false,
            truncated: self.steps >= self.config.max_steps,
            cost,
        })
    }

    fn safe_region(&self) -> SafeRegion {
        self.safe.clone()
    }

    fn unsafe_polytopes(&self) -> Vec<Polytope> {
        self.outside.clone()
    }

    fn render(&self) -> Option<String> {
        let limit = self.config.position_limit;
        let cell = ((self.state[0] + limit) / (2.0 * limit) * 20.0).round() as i64;
        let mut line = vec!['.'; 21];
        if let Ok(i) = usize::try_from(cell) {
            if i < line.len() {
                line[i] = 'o';
            }
        }
        Some(format!("|{}|", line.iter().collect::<String>()))
    }
}
