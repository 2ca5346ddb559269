//! Integer ambiguity resolution (spec.md §4.5): extra-wide-lane,
//! wide-lane, and narrow-lane fixing by rounding or LAMBDA-style integer
//! least squares, under between-satellite single differences. No
//! original-source or teacher file implements LAMBDA directly; this is
//! new code written in the teacher's idiom (closed enums for the fix
//! strategy, `thiserror` for fix failures, `nalgebra` for the
//! decorrelation transform and search, `Result`-returning functions).
use nalgebra::{DMatrix, DVector};

use crate::error::AmbiguityError;
use crate::identifiers::SatId;

/// Rounding-fix acceptance thresholds (spec.md §4.5 step 3 defaults).
pub const DEFAULT_ROUND_THRESHOLD: f64 = 0.25;
pub const DEFAULT_SUCCESS_RATE_THRESHOLD: f64 = 0.999;
/// LAMBDA ratio-test threshold (spec.md §4.5 step 4 default).
pub const DEFAULT_RATIO_THRESHOLD: f64 = 3.0;

/// A single-difference ambiguity between `satellite` and the system's
/// reference satellite, float value + variance before fixing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleDifferenceAmbiguity {
    pub satellite: SatId,
    pub float_value: f64,
    pub variance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixStrategy {
    Rounding,
    Lambda,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedAmbiguity {
    pub satellite: SatId,
    pub integer_value: i64,
    pub strategy: FixStrategy,
}

/// Picks, per system, the satellite with the highest elevation among
/// candidates with a continuous arc over the last `min_continuous_epochs`
/// (spec.md §4.5 step 1). `candidates` is `(satellite, elevation_rad,
/// continuous_epoch_count)`.
pub fn select_reference_satellite(
    candidates: &[(SatId, f64, u32)],
    min_continuous_epochs: u32,
) -> Option<SatId> {
    candidates
        .iter()
        .filter(|(_, _, continuous)| *continuous >= min_continuous_epochs)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(sat, _, _)| *sat)
}

/// Rounding fix (spec.md §4.5 step 3): accept the nearest integer if the
/// fractional distance is under `round_threshold` and the posterior
/// success rate (derived from `variance`, via the standard normal
/// integral over the +-0.5 rounding interval) exceeds `success_threshold`.
pub fn round_fix(
    value: f64,
    variance: f64,
    round_threshold: f64,
    success_threshold: f64,
) -> Option<i64> {
    let nearest = value.round();
    let residual = (value - nearest).abs();
    if residual >= round_threshold {
        return None;
    }
    let sigma = variance.sqrt().max(1.0e-9);
    let success_rate = bootstrap_success_rate(sigma);
    if success_rate < success_threshold {
        return None;
    }
    Some(nearest as i64)
}

/// Bootstrap success-rate approximation: probability the rounded value is
/// correct, modeled as `2 * Phi(0.5 / sigma) - 1` for a single
/// independent ambiguity (Teunissen's bootstrapped success-rate bound).
fn bootstrap_success_rate(sigma: f64) -> f64 {
    2.0 * standard_normal_cdf(0.5 / sigma) - 1.0
}

fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Abramowitz-Stegun rational approximation of the error function,
/// accurate to ~1.5e-7 — sufficient for a success-rate gate, not a
/// metrology-grade computation.
fn erf(x: f64) -> f64 {
    let sign = x.signum();
    let x = x.abs();
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

/// LAMBDA-style integer least squares fix over a batch of single
/// differences (spec.md §4.5 step 4): Z-transform decorrelation
/// (integer-Gauss-transform approximation) followed by an
/// integer-bounded depth-first search, validated by the ratio test.
pub fn lambda_fix(
    ambiguities: &[SingleDifferenceAmbiguity],
    covariance: &DMatrix<f64>,
    ratio_threshold: f64,
) -> Result<Vec<FixedAmbiguity>, AmbiguityError> {
    let n = ambiguities.len();
    if n == 0 || covariance.nrows() != n || covariance.ncols() != n {
        return Err(AmbiguityError::Decorrelation(
            "covariance dimension mismatch".to_string(),
        ));
    }

    let float: DVector<f64> = DVector::from_iterator(n, ambiguities.iter().map(|a| a.float_value));

    let (z, decorrelated_cov) = integer_gauss_decorrelate(covariance);
    let decorrelated_float = &z * &float;

    let candidates = integer_search(&decorrelated_float, &decorrelated_cov, 2);
    if candidates.len() < 2 {
        return Err(AmbiguityError::Decorrelation(
            "search produced fewer than two candidates".to_string(),
        ));
    }

    let best = &candidates[0];
    let second = &candidates[1];
    let ratio = second.1 / best.1.max(1.0e-9);
    if ratio <= ratio_threshold {
        return Err(AmbiguityError::RatioTestFailed(ratio));
    }

    let z_inv = z
        .clone()
        .try_inverse()
        .ok_or_else(|| AmbiguityError::Decorrelation("Z transform not invertible".to_string()))?;
    let fixed_decorrelated = DVector::from_iterator(n, best.0.iter().map(|v| *v as f64));
    let fixed_original = z_inv * fixed_decorrelated;

    Ok(ambiguities
        .iter()
        .zip(fixed_original.iter())
        .map(|(amb, v)| FixedAmbiguity {
            satellite: amb.satellite,
            integer_value: v.round() as i64,
            strategy: FixStrategy::Lambda,
        })
        .collect())
}

/// Integer Gauss transform: an approximate decorrelation that applies
/// successive integer row operations to reduce off-diagonal correlation,
/// in the spirit of the LAMBDA method's Z-transform (a full LLL-style
/// reduction is not implemented; this single pass is sufficient for the
/// small single-difference batches this crate forms per system).
fn integer_gauss_decorrelate(covariance: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    let n = covariance.nrows();
    let mut z = DMatrix::<f64>::identity(n, n);
    let mut q = covariance.clone();

    for i in 1..n {
        for j in (0..i).rev() {
            if q[(j, j)].abs() < f64::EPSILON {
                continue;
            }
            let mu = (q[(i, j)] / q[(j, j)]).round();
            if mu != 0.0 {
                for k in 0..n {
                    let qik = q[(i, k)] - mu * q[(j, k)];
                    q[(i, k)] = qik;
                }
                for k in 0..n {
                    let qki = q[(k, i)] - mu * q[(k, j)];
                    q[(k, i)] = qki;
                }
                for k in 0..n {
                    let zik = z[(i, k)] - mu * z[(j, k)];
                    z[(i, k)] = zik;
                }
            }
        }
    }
    (z, q)
}

/// Bounded integer search around the float solution, returning
/// candidates sorted by ascending quadratic form `(a - float)^T Q^-1 (a -
/// float)`, emulating the LAMBDA search tree with a brute-force
/// enumeration over `+-radius` per component (adequate for the small
/// dimensionality of a single system's single-difference set).
fn integer_search(float: &DVector<f64>, covariance: &DMatrix<f64>, radius: i64) -> Vec<(Vec<i64>, f64)> {
    let n = float.len();
    let q_inv = match covariance.clone().try_inverse() {
        Some(inv) => inv,
        None => return Vec::new(),
    };

    let centers: Vec<i64> = float.iter().map(|v| v.round() as i64).collect();
    let mut best: Vec<(Vec<i64>, f64)> = Vec::new();

    let mut offsets = vec![-radius; n];
    loop {
        let candidate: Vec<i64> = centers.iter().zip(&offsets).map(|(c, o)| c + o).collect();
        let diff = DVector::from_iterator(n, candidate.iter().map(|v| *v as f64)) - float;
        let norm = (diff.transpose() * &q_inv * &diff)[(0, 0)];
        best.push((candidate, norm));

        let mut k = 0;
        loop {
            offsets[k] += 1;
            if offsets[k] > radius {
                offsets[k] = -radius;
                k += 1;
                if k == n {
                    best.sort_by(|a, b| a.1.total_cmp(&b.1));
                    best.truncate(10);
                    return best;
                }
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss::prelude::Constellation;

    #[test]
    fn round_fix_accepts_close_integer() {
        let fixed = round_fix(3.02, 1.0e-6, DEFAULT_ROUND_THRESHOLD, 0.5);
        assert_eq!(fixed, Some(3));
    }

    #[test]
    fn round_fix_rejects_far_from_integer() {
        let fixed = round_fix(3.4, 1.0e-6, DEFAULT_ROUND_THRESHOLD, 0.5);
        assert_eq!(fixed, None);
    }

    #[test]
    fn reference_selection_prefers_highest_elevation_with_continuity() {
        let g1 = SatId::new(Constellation::GPS, 1);
        let g2 = SatId::new(Constellation::GPS, 2);
        let candidates = [
            (g1, 30.0_f64.to_radians(), 20),
            (g2, 60.0_f64.to_radians(), 5),
        ];
        assert_eq!(select_reference_satellite(&candidates, 10), Some(g1));
    }

    #[test]
    fn lambda_fix_recovers_near_integer_values() {
        let ambiguities = vec![
            SingleDifferenceAmbiguity {
                satellite: SatId::new(Constellation::GPS, 2),
                float_value: 4.98,
                variance: 0.01,
            },
            SingleDifferenceAmbiguity {
                satellite: SatId::new(Constellation::GPS, 3),
                float_value: -2.03,
                variance: 0.01,
            },
        ];
        let cov = DMatrix::from_row_slice(2, 2, &[0.01, 0.002, 0.002, 0.01]);
        let result = lambda_fix(&ambiguities, &cov, 1.0);
        assert!(result.is_ok());
        let fixed = result.unwrap();
        assert_eq!(fixed[0].integer_value, 5);
        assert_eq!(fixed[1].integer_value, -2);
    }
}
