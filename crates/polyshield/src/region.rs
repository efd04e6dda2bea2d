//! Polytopic safe regions.
//!
//! A [`Polytope`] is a list of half-spaces `row · x + offset <= 0`. A
//! [`SafeRegion`] is an ordered union of polytopes: a state is safe when it
//! lies inside at least one of them. Order matters, since ties between
//! equally good projections go to the earliest polytope.

use crate::{ensure_len, Result, ShieldError};
use ndarray::{s, Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Convex set `{x : normals · x + offsets <= 0}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polytope {
    normals: Array2<f64>,
    offsets: Array1<f64>,
}

impl Polytope {
    pub fn new(normals: Array2<f64>, offsets: Array1<f64>) -> Result<Self> {
        ensure_len("polytope offsets", normals.nrows(), offsets.len())?;
        if normals.ncols() == 0 {
            return Err(ShieldError::Configuration(
                "polytope normals must have at least one column".into(),
            ));
        }
        Ok(Self { normals, offsets })
    }

    /// Build from an augmented `[P | b]` matrix (offsets in the last column).
    pub fn from_augmented(mat: &Array2<f64>) -> Result<Self> {
        if mat.ncols() < 2 {
            return Err(ShieldError::mismatch("augmented polytope columns", 2, mat.ncols()));
        }
        let last = mat.ncols() - 1;
        Self::new(mat.slice(s![.., ..last]).to_owned(), mat.column(last).to_owned())
    }

    /// Axis-aligned box `low <= x <= high`.
    pub fn from_bounds(low: &Array1<f64>, high: &Array1<f64>) -> Result<Self> {
        ensure_len("box upper bound", low.len(), high.len())?;
        let n = low.len();
        let mut normals = Array2::zeros((2 * n, n));
        let mut offsets = Array1::zeros(2 * n);
        for i in 0..n {
            normals[[2 * i, i]] = 1.0;
            offsets[2 * i] = -high[i];
            normals[[2 * i + 1, i]] = -1.0;
            offsets[2 * i + 1] = low[i];
        }
        Self::new(normals, offsets)
    }

    pub fn normals(&self) -> &Array2<f64> {
        &self.normals
    }

    pub fn offsets(&self) -> &Array1<f64> {
        &self.offsets
    }

    /// Dimension of the space the polytope lives in
    pub fn dim(&self) -> usize {
        self.normals.ncols()
    }

    pub fn num_constraints(&self) -> usize {
        self.normals.nrows()
    }

    /// Constraint values `P · x + b`; non-positive entries are satisfied.
    pub fn margins(&self, x: ArrayView1<f64>) -> Array1<f64> {
        self.normals.dot(&x) + &self.offsets
    }

    /// Exact membership test.
    pub fn contains(&self, x: ArrayView1<f64>) -> bool {
        self.contains_within(x, 0.0)
    }

    /// Membership with every constraint relaxed by `tol`.
    pub fn contains_within(&self, x: ArrayView1<f64>, tol: f64) -> bool {
        x.len() == self.dim() && self.margins(x).iter().all(|&m| m <= tol)
    }
}

/// Ordered union of safe polytopes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SafeRegion {
    polytopes: Vec<Polytope>,
}

impl SafeRegion {
    /// All polytopes must live in the same space.
    pub fn new(polytopes: Vec<Polytope>) -> Result<Self> {
        if let Some(first) = polytopes.first() {
            for p in &polytopes[1..] {
                ensure_len("polytope dimension", first.dim(), p.dim())?;
            }
        }
        Ok(Self { polytopes })
    }

    /// Build from `(normal_matrix, offset_vector)` pairs.
    pub fn from_pairs(pairs: Vec<(Array2<f64>, Array1<f64>)>) -> Result<Self> {
        let polytopes = pairs
            .into_iter()
            .map(|(p, b)| Polytope::new(p, b))
            .collect::<Result<Vec<_>>>()?;
        Self::new(polytopes)
    }

    pub fn polytopes(&self) -> &[Polytope] {
        &self.polytopes
    }

    pub fn len(&self) -> usize {
        self.polytopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polytopes.is_empty()
    }

    /// State dimension, if the region has any polytope.
    pub fn dim(&self) -> Option<usize> {
        self.polytopes.first().map(Polytope::dim)
    }

    /// Disjunctive membership: inside at least one polytope.
    pub fn contains(&self, x: ArrayView1<f64>) -> bool {
        self.polytopes.iter().any(|p| p.contains(x))
    }

    /// Polytopes containing `x` up to `tol`, with their positions in the region.
    pub fn containing(&self, x: ArrayView1<f64>, tol: f64) -> Vec<(usize, &Polytope)> {
        self.polytopes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.contains_within(x, tol))
            .collect()
    }
}
