//! JSON scenario files for `polyshield check`.
//!
//! ```json
//! {
//!   "dynamics": { "a": [[1, 0], [0, 1]], "b": [[1], [0]], "c": [0, 0] },
//!   "safe": [ { "normals": [[1, 0]], "offsets": [-5] } ],
//!   "unsafe": [ { "normals": [[-1, 0]], "offsets": [5] } ],
//!   "bounds": { "low": [-10], "high": [10] },
//!   "state": [4, 0],
//!   "proposal": [10],
//!   "config": { "horizon": 2 }
//! }
//! ```

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};
use polyshield::config::ShieldConfig;
use polyshield::dynamics::LocalDynamics;
use polyshield::region::{Polytope, SafeRegion};
use polyshield::spaces::Box as BoxSpace;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct DynamicsSpec {
    pub a: Vec<Vec<f64>>,
    pub b: Vec<Vec<f64>>,
    pub c: Vec<f64>,
    #[serde(default)]
    pub eps: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct PolytopeSpec {
    pub normals: Vec<Vec<f64>>,
    pub offsets: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BoundsSpec {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub dynamics: DynamicsSpec,
    pub safe: Vec<PolytopeSpec>,
    #[serde(default, rename = "unsafe")]
    pub unsafe_polytopes: Vec<PolytopeSpec>,
    pub bounds: BoundsSpec,
    pub state: Vec<f64>,
    pub proposal: Vec<f64>,
    #[serde(default)]
    pub config: ShieldConfig,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    pub fn dynamics(&self) -> Result<LocalDynamics> {
        let d = &self.dynamics;
        let eps = match &d.eps {
            Some(eps) => Array1::from(eps.clone()),
            None => Array1::zeros(d.c.len()),
        };
        Ok(LocalDynamics::new(
            matrix("dynamics.a", &d.a)?,
            matrix("dynamics.b", &d.b)?,
            Array1::from(d.c.clone()),
            eps,
        )?)
    }

    pub fn safe_region(&self) -> Result<SafeRegion> {
        let polytopes = self
            .safe
            .iter()
            .map(|p| p.build("safe"))
            .collect::<Result<Vec<_>>>()?;
        Ok(SafeRegion::new(polytopes)?)
    }

    pub fn unsafe_polytopes(&self) -> Result<Vec<Polytope>> {
        self.unsafe_polytopes.iter().map(|p| p.build("unsafe")).collect()
    }

    pub fn bounds(&self) -> Result<BoxSpace> {
        if self.bounds.low.len() != self.bounds.high.len() {
            bail!(
                "bounds.low has {} entries but bounds.high has {}",
                self.bounds.low.len(),
                self.bounds.high.len()
            );
        }
        Ok(BoxSpace::new(
            Array1::from(self.bounds.low.clone()),
            Array1::from(self.bounds.high.clone()),
        ))
    }

    pub fn state(&self) -> Array1<f64> {
        Array1::from(self.state.clone())
    }

    pub fn proposal(&self) -> Array1<f64> {
        Array1::from(self.proposal.clone())
    }
}

impl PolytopeSpec {
    fn build(&self, what: &str) -> Result<Polytope> {
        let normals = matrix(&format!("{what}.normals"), &self.normals)?;
        Ok(Polytope::new(normals, Array1::from(self.offsets.clone()))?)
    }
}

fn matrix(what: &str, rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
        bail!("{what}: row {bad} has {} columns, expected {ncols}", rows[bad].len());
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), ncols), flat).with_context(|| format!("{what}: bad shape"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ragged_matrix_rejected() {
        assert!(matrix("m", &[vec![1.0, 2.0], vec![3.0]]).is_err());
        assert_eq!(matrix("m", &[vec![1.0], vec![2.0]]).unwrap().dim(), (2, 1));
    }

    #[test]
    fn test_parse_minimal() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "dynamics": { "a": [[1.0]], "b": [[1.0]], "c": [0.0] },
                "safe": [ { "normals": [[1.0]], "offsets": [-1.0] } ],
                "bounds": { "low": [-1.0], "high": [1.0] },
                "state": [0.0],
                "proposal": [0.5]
            }"#,
        )
        .unwrap();
        assert!(scenario.unsafe_polytopes.is_empty());
        assert_eq!(scenario.config.horizon, ShieldConfig::default().horizon);
        assert_eq!(scenario.dynamics().unwrap().state_dim(), 1);
        assert_eq!(scenario.safe_region().unwrap().len(), 1);
    }
}
