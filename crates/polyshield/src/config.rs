//! Shield and solver configuration.

use crate::{Result, ShieldError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Numerical settings threaded into every QP/LP solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iteration budget per solve; running out counts as infeasible
    pub max_iterations: usize,
    /// Maximum constraint violation accepted as feasible
    pub feasibility_tol: f64,
    /// Weight of the `||u||^2` term in the full re-optimization objective
    pub regularization: f64,
    /// Emit per-iteration solver traces
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            feasibility_tol: 1e-7,
            regularization: 1.0,
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// Set the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the feasibility tolerance
    pub fn with_feasibility_tol(mut self, tol: f64) -> Self {
        self.feasibility_tol = tol;
        self
    }

    /// Set the regularization weight
    pub fn with_regularization(mut self, weight: f64) -> Self {
        self.regularization = weight;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(ShieldError::Configuration(
                "solver.max_iterations must be positive".into(),
            ));
        }
        if !(self.feasibility_tol >= 0.0 && self.feasibility_tol.is_finite()) {
            return Err(ShieldError::Configuration(format!(
                "solver.feasibility_tol must be finite and non-negative, got {}",
                self.feasibility_tol
            )));
        }
        if !(self.regularization > 0.0 && self.regularization.is_finite()) {
            return Err(ShieldError::Configuration(format!(
                "solver.regularization must be finite and positive, got {}",
                self.regularization
            )));
        }
        Ok(())
    }
}

/// Configuration for the projection shield
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Number of future steps certified before re-evaluating
    pub horizon: usize,
    /// Relative tolerance for matching a state against the cached decision
    pub cache_rtol: f64,
    /// Absolute tolerance for matching a state against the cached decision
    pub cache_atol: f64,
    /// Solver settings
    pub solver: SolverConfig,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            horizon: 5,
            cache_rtol: 1e-5,
            cache_atol: 1e-8,
            solver: SolverConfig::default(),
        }
    }
}

impl ShieldConfig {
    /// Set the horizon
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set the solver settings
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Set both cache tolerances
    pub fn with_cache_tolerance(mut self, rtol: f64, atol: f64) -> Self {
        self.cache_rtol = rtol;
        self.cache_atol = atol;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(ShieldError::InvalidHorizon(self.horizon));
        }
        if self.cache_rtol < 0.0 || self.cache_atol < 0.0 {
            return Err(ShieldError::Configuration(
                "cache tolerances must be non-negative".into(),
            ));
        }
        self.solver.validate()
    }

    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ShieldConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let config = ShieldConfig::default().with_horizon(0);
        assert!(matches!(config.validate(), Err(ShieldError::InvalidHorizon(0))));
    }

    #[test]
    fn test_bad_regularization_rejected() {
        let config =
            ShieldConfig::default().with_solver(SolverConfig::default().with_regularization(0.0));
        assert!(matches!(config.validate(), Err(ShieldError::Configuration(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ShieldConfig::from_json(r#"{"horizon": 12, "solver": {"max_iterations": 50}}"#)
            .unwrap();
        assert_eq!(config.horizon, 12);
        assert_eq!(config.solver.max_iterations, 50);
        assert_eq!(config.solver.feasibility_tol, 1e-7);
        assert_eq!(config.cache_rtol, 1e-5);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shield.json");
        let config = ShieldConfig::default().with_horizon(3);
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = ShieldConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
