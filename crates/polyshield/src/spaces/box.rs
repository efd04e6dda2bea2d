//! Bounded continuous space.

use super::Space;
use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Box space for continuous vectors with component-wise bounds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Box {
    /// Lower bound for each element
    pub low: Array1<f64>,
    /// Upper bound for each element
    pub high: Array1<f64>,
}

impl Box {
    /// Create a new box space with given bounds
    pub fn new(low: Array1<f64>, high: Array1<f64>) -> Self {
        assert_eq!(low.len(), high.len(), "Low and high must have same shape");
        Self { low, high }
    }

    /// Create a box space with uniform bounds
    pub fn uniform(dim: usize, low: f64, high: f64) -> Self {
        Self::new(Array1::from_elem(dim, low), Array1::from_elem(dim, high))
    }

    /// Create a box space from -inf to +inf (unbounded)
    pub fn unbounded(dim: usize) -> Self {
        Self::uniform(dim, f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Create a symmetric box [-1, 1] for all elements
    pub fn symmetric(dim: usize) -> Self {
        Self::uniform(dim, -1.0, 1.0)
    }

    /// Number of components
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Index of the first component whose lower bound exceeds its upper bound.
    pub fn first_inverted(&self) -> Option<usize> {
        self.low
            .iter()
            .zip(self.high.iter())
            .position(|(&l, &h)| !(l <= h))
    }

    /// Project a value onto the box component-wise.
    pub fn clip(&self, value: &Array1<f64>) -> Array1<f64> {
        let mut out = value.clone();
        for ((v, &l), &h) in out.iter_mut().zip(self.low.iter()).zip(self.high.iter()) {
            *v = v.max(l).min(h);
        }
        out
    }

    /// The in-bounds value closest to the origin.
    pub fn closest_to_zero(&self) -> Array1<f64> {
        self.clip(&Array1::zeros(self.dim()))
    }
}

impl Space for Box {
    type Sample = Array1<f64>;

    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample {
        let mut result = Array1::zeros(self.dim());
        for ((&l, &h), r) in self.low.iter().zip(self.high.iter()).zip(result.iter_mut()) {
            *r = if l < h && (h - l).is_finite() {
                Uniform::new(l, h).sample(rng)
            } else {
                // Degenerate or half-open interval: take the point nearest zero
                0.0f64.max(l).min(h)
            };
        }
        result
    }

    fn contains(&self, value: &Self::Sample) -> bool {
        if value.len() != self.low.len() {
            return false;
        }
        value
            .iter()
            .zip(self.low.iter())
            .zip(self.high.iter())
            .all(|((&v, &l), &h)| v >= l && v <= h)
    }

    fn project(&self, value: &Self::Sample) -> Self::Sample {
        self.clip(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_box_sample() {
        let space = Box::uniform(3, -1.0, 1.0);
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let sample = space.sample(&mut rng);
            assert!(space.contains(&sample));
            assert_eq!(sample.len(), 3);
        }
    }

    #[test]
    fn test_box_contains() {
        let space = Box::uniform(2, 0.0, 1.0);

        assert!(space.contains(&array![0.5, 0.5]));
        assert!(!space.contains(&array![1.5, 0.5]));
        assert!(!space.contains(&array![0.5]));
    }

    #[test]
    fn test_box_clip_and_inverted() {
        let space = Box::new(array![-1.0, 2.0], array![1.0, 3.0]);
        assert_eq!(space.clip(&array![5.0, 0.0]), array![1.0, 2.0]);
        assert_eq!(space.closest_to_zero(), array![0.0, 2.0]);
        assert_eq!(space.first_inverted(), None);
        assert!(space.contains(&space.project(&array![-9.0, 9.0])));

        let broken = Box::new(array![0.0, 1.0], array![1.0, -1.0]);
        assert_eq!(broken.first_inverted(), Some(1));
    }

    #[test]
    fn test_unbounded_sample_is_finite() {
        let space = Box::unbounded(2);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let sample = space.sample(&mut rng);
        assert!(sample.iter().all(|v| v.is_finite()));
    }
}
