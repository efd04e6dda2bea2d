//! Action and state spaces.
//!
//! States and actions are flat `f64` vectors; a [`Box`] carries their
//! component-wise bounds.

mod r#box;

pub use r#box::Box;

use rand::Rng;

/// A set of vectors that can be sampled from and projected onto.
pub trait Space: Clone {
    type Sample;

    /// Draw a random element
    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample;

    fn contains(&self, value: &Self::Sample) -> bool;

    /// Nearest element of the space to `value`
    fn project(&self, value: &Self::Sample) -> Self::Sample;
}
