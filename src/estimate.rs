//! Single-Point-Positioning bootstrap used to seed the filter's position
//! and receiver-clock Variables on the very first epoch (spec.md §4.4
//! "may seed from SPP"), grounded on the teacher's own `estimate.rs`
//! (`(G^T G)^-1` least-squares via `try_inverse`, `Matrix4xX`/`DVector`).
use nalgebra::base::{DVector, Matrix4xX};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A four-parameter (dx, dy, dz, dt) least-squares correction of an a
/// priori position, plus its dilution-of-precision figures.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SppEstimate {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub dt: f64,
    pub pdop: f64,
    pub tdop: f64,
}

impl SppEstimate {
    /// Builds Self from the design matrix `g` (one row per satellite,
    /// columns `[dE/dx, dE/dy, dE/dz, 1]`) and prefit vector `y`.
    pub fn new(g: Matrix4xX<f64>, y: DVector<f64>) -> Option<Self> {
        let g_prime = g.transpose();
        let q = (g.clone() * g_prime.clone()).try_inverse()?;
        let x = q.clone() * g_prime * y;
        let pdop = (q[(0, 0)] + q[(1, 1)] + q[(2, 2)]).sqrt();
        let tdop = q[(3, 3)].sqrt();
        Some(Self {
            dx: x[0],
            dy: x[1],
            dz: x[2],
            dt: x[3],
            pdop,
            tdop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_solution_for_well_conditioned_geometry() {
        // four satellites around a unit-elevation tetrahedron, unit weights
        let g = Matrix4xX::from_columns(&[
            nalgebra::Vector4::new(1.0, 0.0, 0.0, 1.0),
            nalgebra::Vector4::new(0.0, 1.0, 0.0, 1.0),
            nalgebra::Vector4::new(0.0, 0.0, 1.0, 1.0),
            nalgebra::Vector4::new(-1.0, -1.0, -1.0, 1.0),
        ]);
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0, -5.0]);
        let estimate = SppEstimate::new(g, y).expect("well-conditioned geometry");
        assert!(estimate.pdop.is_finite());
    }
}
