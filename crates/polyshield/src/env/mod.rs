//! Control environments with known safe regions.
//!
//! Provides the `ControlEnv` trait used by demos and end-to-end tests, plus
//! the `EpisodeStats` wrapper that tracks return and safety violations.

mod traits;
mod wrappers;

pub use traits::{ControlEnv, StepResult};
pub use wrappers::EpisodeStats;
