//! # polyshield
//!
//! A runtime safety shield for black-box control policies.
//!
//! ## Overview
//!
//! polyshield provides:
//! - Local linear models of the environment via the `LocalModelProvider` trait
//! - Polytopic safe regions (`Polytope`, `SafeRegion`)
//! - Horizon-unrolled safety constraints (`HorizonConstraintBuilder`)
//! - A two-tier projection QP (`SafetyQp`) and a retreat controller (`BackupController`)
//! - The `Shield` orchestrator, which accepts, projects or replaces proposed actions
//! - A best-effort `CostCriticShield` for policies that only come with a learned cost
//!
//! ## Features
//!
//! - `default` - Sequential evaluation of safe polytopes
//! - `parallel` - Evaluate safe polytopes concurrently with rayon
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use polyshield::prelude::*;
//! use ndarray::{array, Array1};
//!
//! let model = AffineModel::new(dynamics);
//! let region = SafeRegion::new(vec![Polytope::new(array![[1.0, 0.0]], array![-5.0])?])?;
//! let policy = FnPolicy::new(|_state: ArrayView1<f64>| array![10.0]);
//!
//! let mut shield = Shield::new(policy, model, region, unsafe_polys, bounds, ShieldConfig::default())?;
//! let action = shield.decide(&array![4.0, 0.0])?;
//! ```

pub mod backup;
pub mod config;
pub mod dynamics;
pub mod env;
pub mod horizon;
pub mod log;
pub mod policy;
pub mod projection;
pub mod region;
pub mod shield;
pub mod solver;
pub mod spaces;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backup::BackupController;
    pub use crate::config::{ShieldConfig, SolverConfig};
    pub use crate::dynamics::{AffineModel, FiniteDifferenceModel, LocalDynamics, LocalModelProvider};
    pub use crate::env::{ControlEnv, StepResult};
    pub use crate::horizon::{ConstraintSystem, HorizonConstraintBuilder, HorizonSystem};
    pub use crate::policy::{FnPolicy, NoisyPolicy, Policy, RandomPolicy};
    pub use crate::projection::{Candidate, SafetyQp, Tier};
    pub use crate::region::{Polytope, SafeRegion};
    pub use crate::shield::{
        CostCritic, CostCriticShield, CriticConfig, Decision, FnCritic, Outcome, Shield,
        ShieldReport,
    };
    pub use crate::spaces::{Box, Space};

    // Logging exports
    pub use crate::log::{CompositeLogger, ConsoleLogger, MemoryLogger, MetricLogger, NoOpLogger};

    pub use ndarray::{Array1, Array2, ArrayView1};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum ShieldError {
    #[error("Invalid horizon: {0} (must be at least 1)")]
    InvalidHorizon(usize),

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ShieldError {
    /// Shorthand for a length check that failed.
    pub(crate) fn mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        ShieldError::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }
}

/// Fail with `DimensionMismatch` unless `actual == expected`.
pub(crate) fn ensure_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ShieldError::mismatch(what, expected, actual))
    }
}

pub type Result<T> = core::result::Result<T, ShieldError>;
