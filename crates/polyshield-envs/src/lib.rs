//! Built-in environments for polyshield.
//!
//! Small linear systems with known safe regions, used for demos and
//! end-to-end tests:
//! - `DoubleIntegrator` - point mass kept inside a position/velocity box
//! - `WallCart` - cart rewarded for driving towards a wall it must not hit

mod double_integrator;
mod wall_cart;

pub use double_integrator::{DoubleIntegrator, DoubleIntegratorConfig};
pub use wall_cart::{WallCart, WallCartConfig};

/// Names accepted by [`make`].
pub const ENV_NAMES: &[&str] = &["double-integrator", "wall-cart"];

/// Environment plus the model the shield should use for it.
pub struct Registered {
    pub env: Box<dyn polyshield::env::ControlEnv>,
    pub model: polyshield::dynamics::AffineModel,
}

/// Build a named environment with its default configuration.
pub fn make(name: &str, seed: u64) -> polyshield::Result<Registered> {
    match name {
        "double-integrator" => {
            let env = DoubleIntegrator::new(DoubleIntegratorConfig::default(), seed)?;
            let model = env.model();
            Ok(Registered {
                env: Box::new(env),
                model,
            })
        }
        "wall-cart" => {
            let env = WallCart::new(WallCartConfig::default(), seed)?;
            let model = env.model();
            Ok(Registered {
                env: Box::new(env),
                model,
            })
        }
        other => Err(polyshield::ShieldError::Configuration(format!(
            "unknown environment '{other}', expected one of: {}",
            ENV_NAMES.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_known_names() {
        for name in ENV_NAMES {
            let registered = make(name, 0).unwrap();
            assert_eq!(registered.env.action_space().dim(), 1);
        }
        assert!(make("cartpole", 0).is_err());
    }
}
